//! Type definition for Pod primitive in k8s cluster and the pod views the cache works with.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::common::{
    LabelSelector, ObjectMeta, RuntimeResources, POD_RESOURCE_TYPE_ANNOTATION_KEY,
};

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Resources {
    #[serde(default)]
    pub limits: RuntimeResources,
    #[serde(default)]
    pub requests: RuntimeResources,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodAffinityTerm {
    #[serde(default)]
    pub label_selector: LabelSelector,
    pub topology_key: String,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodAffinityRules {
    #[serde(default)]
    pub required: Vec<PodAffinityTerm>,
    #[serde(default)]
    pub preferred: Vec<PodAffinityTerm>,
}

impl PodAffinityRules {
    fn is_empty(&self) -> bool {
        self.required.is_empty() && self.preferred.is_empty()
    }
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Affinity {
    pub pod_affinity: Option<PodAffinityRules>,
    pub pod_anti_affinity: Option<PodAffinityRules>,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodSpec {
    /// Name of the node the pod is bound (or assumed) to.
    pub node_name: Option<String>,
    /// Simplified: instead of vector of containers - one container with resources
    #[serde(default)]
    pub resources: Resources,
    pub affinity: Option<Affinity>,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    pub fn new(name: &str, cpu: u64, ram: u64) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: PodSpec {
                node_name: None,
                resources: Resources {
                    limits: RuntimeResources { cpu, ram },
                    requests: RuntimeResources { cpu, ram },
                },
                affinity: None,
            },
            status: Default::default(),
        }
    }

    /// Cache key of the pod: `namespace/name`.
    pub fn key(&self) -> String {
        self.metadata.key()
    }

    pub fn node_name(&self) -> Option<&str> {
        self.spec.node_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn requests(&self) -> RuntimeResources {
        self.spec.resources.requests
    }

    /// True if the pod declares any inter-pod affinity or anti-affinity term.
    pub fn has_affinity(&self) -> bool {
        match &self.spec.affinity {
            Some(affinity) => {
                affinity.pod_affinity.as_ref().is_some_and(|a| !a.is_empty())
                    || affinity.pod_anti_affinity.as_ref().is_some_and(|a| !a.is_empty())
            }
            None => false,
        }
    }

    pub fn has_required_anti_affinity(&self) -> bool {
        self.spec
            .affinity
            .as_ref()
            .and_then(|affinity| affinity.pod_anti_affinity.as_ref())
            .is_some_and(|anti_affinity| !anti_affinity.required.is_empty())
    }
}

/// Resource assurance class of a pod. Decides which accounting bucket its requests fall into.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodResourceType {
    #[serde(rename = "guaranteed")]
    Guaranteed,
    #[serde(rename = "best-effort")]
    BestEffort,
}

impl PodResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodResourceType::Guaranteed => "guaranteed",
            PodResourceType::BestEffort => "best-effort",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "guaranteed" => Some(PodResourceType::Guaranteed),
            "best-effort" => Some(PodResourceType::BestEffort),
            _ => None,
        }
    }
}

impl fmt::Display for PodResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the resource type of a pod from its annotation. Returns the offending annotation
/// value (empty if missing) when the pod cannot be classified.
pub fn get_pod_resource_type(pod: &Pod) -> Result<PodResourceType, String> {
    let value = pod
        .metadata
        .annotations
        .get(POD_RESOURCE_TYPE_ANNOTATION_KEY)
        .map(String::as_str)
        .unwrap_or("");
    PodResourceType::parse(value).ok_or_else(|| value.to_string())
}

/// Pod being assumed or forgotten together with the victims it displaces on its node.
#[derive(Debug, Clone)]
pub struct CachePodInfo {
    pub pod: Arc<Pod>,
    pub victims: Vec<Arc<Pod>>,
}

impl CachePodInfo {
    pub fn new(pod: Pod) -> Self {
        Self {
            pod: Arc::new(pod),
            victims: Vec::new(),
        }
    }

    pub fn with_victims(pod: Pod, victims: Vec<Pod>) -> Self {
        Self {
            pod: Arc::new(pod),
            victims: victims.into_iter().map(Arc::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::common::POD_RESOURCE_TYPE_ANNOTATION_KEY;
    use crate::core::pod::{
        get_pod_resource_type, Affinity, Pod, PodAffinityRules, PodAffinityTerm, PodResourceType,
    };

    fn annotated_pod(value: &str) -> Pod {
        let mut pod = Pod::new("pod", 0, 0);
        pod.metadata.annotations.insert(
            POD_RESOURCE_TYPE_ANNOTATION_KEY.to_string(),
            value.to_string(),
        );
        pod
    }

    #[test]
    fn test_pod_resource_type_from_annotation() {
        assert_eq!(
            Ok(PodResourceType::BestEffort),
            get_pod_resource_type(&annotated_pod("best-effort"))
        );
        assert_eq!(
            Ok(PodResourceType::Guaranteed),
            get_pod_resource_type(&annotated_pod("guaranteed"))
        );
        assert_eq!(
            Err("burstable".to_string()),
            get_pod_resource_type(&annotated_pod("burstable"))
        );
        assert_eq!(
            Err("".to_string()),
            get_pod_resource_type(&Pod::new("pod", 0, 0))
        );
    }

    #[test]
    fn test_affinity_flags() {
        let mut pod = Pod::new("pod", 0, 0);
        assert!(!pod.has_affinity());
        assert!(!pod.has_required_anti_affinity());

        let term = PodAffinityTerm {
            label_selector: Default::default(),
            topology_key: "zone".to_string(),
        };
        pod.spec.affinity = Some(Affinity {
            pod_affinity: None,
            pod_anti_affinity: Some(PodAffinityRules {
                required: vec![],
                preferred: vec![term.clone()],
            }),
        });
        assert!(pod.has_affinity());
        assert!(!pod.has_required_anti_affinity());

        pod.spec.affinity = Some(Affinity {
            pod_affinity: None,
            pod_anti_affinity: Some(PodAffinityRules {
                required: vec![term],
                preferred: vec![],
            }),
        });
        assert!(pod.has_affinity());
        assert!(pod.has_required_anti_affinity());
    }

    #[test]
    fn test_empty_node_name_is_unassigned() {
        let mut pod = Pod::new("pod", 0, 0);
        assert_eq!(None, pod.node_name());
        pod.spec.node_name = Some(String::new());
        assert_eq!(None, pod.node_name());
        pod.spec.node_name = Some("node1".to_string());
        assert_eq!(Some("node1"), pod.node_name());
        assert_eq!("default/pod", pod.key());
    }
}
