//! Data shared by the plugins during one scheduling cycle of one pod.

use crate::core::cache::snapshot::NodeInfoLister;
use crate::core::pod::{get_pod_resource_type, Pod, PodResourceType};
use crate::core::scheduler::interface::ScheduleError;

pub struct CycleState<'a> {
    lister: &'a dyn NodeInfoLister,
    pod_resource_type: Option<PodResourceType>,
}

impl<'a> CycleState<'a> {
    pub fn new(lister: &'a dyn NodeInfoLister) -> Self {
        Self {
            lister,
            pod_resource_type: None,
        }
    }

    pub fn lister(&self) -> &'a dyn NodeInfoLister {
        self.lister
    }

    pub fn set_pod_resource_type(&mut self, pod_resource_type: PodResourceType) {
        self.pod_resource_type = Some(pod_resource_type);
    }

    pub fn pod_resource_type(&self) -> Option<PodResourceType> {
        self.pod_resource_type
    }

    /// Resource type recorded for the cycle, falling back to the pod's annotation.
    pub fn resolve_pod_resource_type(&self, pod: &Pod) -> Result<PodResourceType, ScheduleError> {
        match self.pod_resource_type {
            Some(pod_resource_type) => Ok(pod_resource_type),
            None => get_pod_resource_type(pod).map_err(|value| ScheduleError::UnknownPodResourceType {
                pod: pod.key(),
                value,
            }),
        }
    }
}
