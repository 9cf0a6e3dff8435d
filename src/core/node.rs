//! Node-level objects tracked by the scheduler cache: the raw node, the node-management (NM)
//! node and the custom node resource (CNR) report.

use serde::{Deserialize, Serialize};

use crate::core::common::{ObjectMeta, RuntimeResources, SCHEDULER_NAME_ANNOTATION_KEY};

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeStatus {
    // Total amount of resources
    pub capacity: RuntimeResources,
    // Resources available for pods, defaults to capacity when not reported.
    #[serde(default)]
    pub allocatable: Option<RuntimeResources>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Node {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    pub fn new(name: &str, cpu: u64, ram: u64) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            status: NodeStatus {
                capacity: RuntimeResources { cpu, ram },
                allocatable: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn allocatable(&self) -> RuntimeResources {
        self.status.allocatable.unwrap_or(self.status.capacity)
    }

    /// Name of the scheduler owning this node, empty when not annotated.
    pub fn scheduler_name(&self) -> &str {
        scheduler_name_of(&self.metadata)
    }
}

/// Node as seen by the node manager. Nodes may be reported by the node manager only, in which
/// case the NM node is the sole source of resources for the node.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NMNode {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub resource_capacity: RuntimeResources,
}

impl NMNode {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn scheduler_name(&self) -> &str {
        scheduler_name_of(&self.metadata)
    }
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CustomNodeResourceStatus {
    #[serde(default)]
    pub resource_capacity: RuntimeResources,
    #[serde(default)]
    pub resource_allocatable: RuntimeResources,
}

/// Custom node resource report published by a node agent. Named after the node it describes.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CustomNodeResource {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: CustomNodeResourceStatus,
}

impl CustomNodeResource {
    pub fn new(node_name: &str, capacity: RuntimeResources) -> Self {
        Self {
            metadata: ObjectMeta::named(node_name),
            status: CustomNodeResourceStatus {
                resource_capacity: capacity,
                resource_allocatable: capacity,
            },
        }
    }

    pub fn node_name(&self) -> &str {
        &self.metadata.name
    }
}

fn scheduler_name_of(metadata: &ObjectMeta) -> &str {
    metadata
        .annotations
        .get(SCHEDULER_NAME_ANNOTATION_KEY)
        .map(String::as_str)
        .unwrap_or("")
}
