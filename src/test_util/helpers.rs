use std::collections::BTreeMap;

use crate::core::common::{
    LabelSelector, ObjectMeta, RuntimeResources, POD_RESOURCE_TYPE_ANNOTATION_KEY,
    SCHEDULER_NAME_ANNOTATION_KEY,
};
use crate::core::node::{CustomNodeResource, Node};
use crate::core::pod::{Affinity, Pod, PodAffinityRules, PodAffinityTerm, PodResourceType};
use crate::core::policy::{
    Owner, OwnerType, PodDisruptionBudget, PodDisruptionBudgetSpec, PodGroup, PodGroupSpec,
};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn namespaced(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: name.to_string(),
        namespace: namespace.to_string(),
        ..Default::default()
    }
}

/// Node annotated with `scheduler_name`, left unannotated when it is empty.
pub fn make_node(name: &str, cpu: u64, ram: u64, scheduler_name: &str) -> Node {
    let mut node = Node::new(name, cpu, ram);
    if !scheduler_name.is_empty() {
        node.metadata.annotations.insert(
            SCHEDULER_NAME_ANNOTATION_KEY.to_string(),
            scheduler_name.to_string(),
        );
    }
    node
}

pub fn make_cnr(node_name: &str, cpu: u64, ram: u64) -> CustomNodeResource {
    CustomNodeResource::new(node_name, RuntimeResources::new(cpu, ram))
}

pub fn make_pod(name: &str, cpu: u64, ram: u64, resource_type: PodResourceType) -> Pod {
    let mut pod = Pod::new(name, cpu, ram);
    pod.metadata.annotations.insert(
        POD_RESOURCE_TYPE_ANNOTATION_KEY.to_string(),
        resource_type.as_str().to_string(),
    );
    pod
}

pub fn assigned(mut pod: Pod, node_name: &str) -> Pod {
    pod.spec.node_name = Some(node_name.to_string());
    pod
}

fn zone_term() -> PodAffinityTerm {
    PodAffinityTerm {
        label_selector: LabelSelector::default(),
        topology_key: "zone".to_string(),
    }
}

pub fn with_pod_affinity(mut pod: Pod) -> Pod {
    pod.spec.affinity = Some(Affinity {
        pod_affinity: Some(PodAffinityRules {
            required: vec![],
            preferred: vec![zone_term()],
        }),
        pod_anti_affinity: None,
    });
    pod
}

pub fn with_required_anti_affinity(mut pod: Pod) -> Pod {
    pod.spec.affinity = Some(Affinity {
        pod_affinity: None,
        pod_anti_affinity: Some(PodAffinityRules {
            required: vec![zone_term()],
            preferred: vec![],
        }),
    });
    pod
}

pub fn make_owner(
    owner_type: OwnerType,
    namespace: &str,
    name: &str,
    pod_labels: &[(&str, &str)],
) -> Owner {
    Owner {
        owner_type,
        metadata: namespaced(namespace, name),
        labels: labels(pod_labels),
    }
}

pub fn make_pdb(namespace: &str, name: &str, match_labels: &[(&str, &str)]) -> PodDisruptionBudget {
    PodDisruptionBudget {
        metadata: namespaced(namespace, name),
        spec: PodDisruptionBudgetSpec {
            selector: LabelSelector {
                match_labels: labels(match_labels),
            },
            min_available: Some(1),
            max_unavailable: None,
        },
        status: Default::default(),
    }
}

pub fn make_pod_group(namespace: &str, name: &str, min_member: u32) -> PodGroup {
    PodGroup {
        metadata: namespaced(namespace, name),
        spec: PodGroupSpec {
            min_member,
            schedule_timeout_seconds: None,
        },
        status: Default::default(),
    }
}
