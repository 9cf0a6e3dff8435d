//! Aggregated view of one node: node level objects, pods placed on it by cache bookkeeping and
//! the figures derived from those pods.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;

use crate::core::common::RuntimeResources;
use crate::core::node::{CustomNodeResource, NMNode, Node};
use crate::core::pod::{get_pod_resource_type, Pod, PodResourceType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInfo {
    name: String,

    node: Option<Arc<Node>>,
    nm_node: Option<Arc<NMNode>>,
    cnr: Option<Arc<CustomNodeResource>>,

    node_in_partition: bool,
    nm_node_in_partition: bool,

    // Pod key -> pod
    pods: BTreeMap<String, Arc<Pod>>,
    pods_with_affinity: BTreeSet<String>,
    pods_with_required_anti_affinity: BTreeSet<String>,

    requested: RuntimeResources,
    // Non-zero requests per resource assurance class.
    guaranteed_requested: RuntimeResources,
    best_effort_requested: RuntimeResources,

    generation: u64,
}

impl NodeInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> Option<&Arc<Node>> {
        self.node.as_ref()
    }

    pub fn nm_node(&self) -> Option<&Arc<NMNode>> {
        self.nm_node.as_ref()
    }

    pub fn cnr(&self) -> Option<&Arc<CustomNodeResource>> {
        self.cnr.as_ref()
    }

    pub fn node_in_scheduler_partition(&self) -> bool {
        self.node_in_partition
    }

    pub fn nm_node_in_scheduler_partition(&self) -> bool {
        self.nm_node_in_partition
    }

    pub fn in_scheduler_partition(&self) -> bool {
        self.node_in_partition || self.nm_node_in_partition
    }

    /// Placeholder node infos exist only because pods or a CNR reference a node whose node and
    /// NM node objects are unknown.
    pub fn is_placeholder(&self) -> bool {
        self.node.is_none() && self.nm_node.is_none()
    }

    /// Nothing references the node anymore, the node info can be dropped.
    pub fn is_empty(&self) -> bool {
        self.is_placeholder() && self.cnr.is_none() && self.pods.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn set_node(&mut self, node: Arc<Node>, in_partition: bool) {
        self.node = Some(node);
        self.node_in_partition = in_partition;
    }

    pub fn remove_node(&mut self) -> Option<Arc<Node>> {
        self.node_in_partition = false;
        self.node.take()
    }

    pub fn set_nm_node(&mut self, nm_node: Arc<NMNode>, in_partition: bool) {
        self.nm_node = Some(nm_node);
        self.nm_node_in_partition = in_partition;
    }

    pub fn remove_nm_node(&mut self) -> Option<Arc<NMNode>> {
        self.nm_node_in_partition = false;
        self.nm_node.take()
    }

    pub fn set_cnr(&mut self, cnr: Arc<CustomNodeResource>) {
        self.cnr = Some(cnr);
    }

    pub fn remove_cnr(&mut self) -> Option<Arc<CustomNodeResource>> {
        self.cnr.take()
    }

    /// Resources available for pods on the node: taken from the node object, then from the NM
    /// node, then from the CNR report.
    pub fn allocatable(&self) -> RuntimeResources {
        if let Some(node) = &self.node {
            return node.allocatable();
        }
        if let Some(nm_node) = &self.nm_node {
            return nm_node.resource_capacity;
        }
        self.cnr
            .as_ref()
            .map(|cnr| cnr.status.resource_allocatable)
            .unwrap_or_default()
    }

    pub fn pods(&self) -> impl Iterator<Item = &Arc<Pod>> {
        self.pods.values()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn get_pod(&self, pod_key: &str) -> Option<&Arc<Pod>> {
        self.pods.get(pod_key)
    }

    pub fn has_pod(&self, pod_key: &str) -> bool {
        self.pods.contains_key(pod_key)
    }

    pub fn pods_with_affinity(&self) -> &BTreeSet<String> {
        &self.pods_with_affinity
    }

    pub fn pods_with_required_anti_affinity(&self) -> &BTreeSet<String> {
        &self.pods_with_required_anti_affinity
    }

    /// Sum of the raw requests of all pods on the node.
    pub fn requested(&self) -> RuntimeResources {
        self.requested
    }

    /// Sum of non-zero requests of the pods of the given resource type.
    pub fn non_zero_requested(&self, resource_type: PodResourceType) -> RuntimeResources {
        match resource_type {
            PodResourceType::Guaranteed => self.guaranteed_requested,
            PodResourceType::BestEffort => self.best_effort_requested,
        }
    }

    /// Returns false if a pod with the same key is already on the node.
    pub fn add_pod(&mut self, pod: Arc<Pod>) -> bool {
        let key = pod.key();
        if self.pods.contains_key(&key) {
            return false;
        }

        self.requested += pod.requests();
        match get_pod_resource_type(&pod) {
            Ok(PodResourceType::Guaranteed) => self.guaranteed_requested += pod.requests().non_zero(),
            Ok(PodResourceType::BestEffort) => self.best_effort_requested += pod.requests().non_zero(),
            Err(value) => debug!(
                "Pod {:?} on node {:?} has unknown resource type {:?}, not accounted by class",
                key, self.name, value
            ),
        }
        if pod.has_affinity() {
            self.pods_with_affinity.insert(key.clone());
        }
        if pod.has_required_anti_affinity() {
            self.pods_with_required_anti_affinity.insert(key.clone());
        }

        self.pods.insert(key, pod);
        true
    }

    pub fn remove_pod(&mut self, pod_key: &str) -> Option<Arc<Pod>> {
        let pod = self.pods.remove(pod_key)?;

        self.requested = self.requested.saturating_sub(&pod.requests());
        match get_pod_resource_type(&pod) {
            Ok(PodResourceType::Guaranteed) => {
                self.guaranteed_requested = self
                    .guaranteed_requested
                    .saturating_sub(&pod.requests().non_zero())
            }
            Ok(PodResourceType::BestEffort) => {
                self.best_effort_requested = self
                    .best_effort_requested
                    .saturating_sub(&pod.requests().non_zero())
            }
            Err(_) => {}
        }
        self.pods_with_affinity.remove(pod_key);
        self.pods_with_required_anti_affinity.remove(pod_key);

        Some(pod)
    }
}
