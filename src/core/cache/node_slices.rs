//! Node index lists kept by snapshots: partition membership and affinity flags.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::core::cache::node_info::NodeInfo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeSliceError {
    #[error("node {0:?} is already in the slice")]
    AlreadyExists(String),
    #[error("node {0:?} is not in the slice")]
    NotFound(String),
}

/// List of node infos with O(1) add and delete by node name. Deletion swaps the last element
/// into the freed position, so the order is not stable.
#[derive(Debug, Default)]
pub struct NodeHashSlice {
    nodes: Vec<Arc<NodeInfo>>,
    index: HashMap<String, usize>,
}

impl NodeHashSlice {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, node_info: &Arc<NodeInfo>) -> Result<(), NodeSliceError> {
        if self.index.contains_key(node_info.name()) {
            return Err(NodeSliceError::AlreadyExists(node_info.name().to_string()));
        }
        self.index
            .insert(node_info.name().to_string(), self.nodes.len());
        self.nodes.push(node_info.clone());
        Ok(())
    }

    pub fn del(&mut self, node_info: &NodeInfo) -> Result<(), NodeSliceError> {
        let position = self
            .index
            .remove(node_info.name())
            .ok_or_else(|| NodeSliceError::NotFound(node_info.name().to_string()))?;
        self.nodes.swap_remove(position);
        if let Some(moved) = self.nodes.get(position) {
            self.index.insert(moved.name().to_string(), position);
        }
        Ok(())
    }

    pub fn contains(&self, node_name: &str) -> bool {
        self.index.contains_key(node_name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> Vec<Arc<NodeInfo>> {
        self.nodes.clone()
    }

    pub(crate) fn as_slice(&self) -> &[Arc<NodeInfo>] {
        &self.nodes
    }
}

#[derive(Debug, Default)]
pub struct NodeSlices {
    pub in_partition: NodeHashSlice,
    pub out_of_partition: NodeHashSlice,
    pub have_pods_with_affinity: NodeHashSlice,
    pub have_pods_with_required_anti_affinity: NodeHashSlice,
}

fn op(slice: &mut NodeHashSlice, node_info: &Arc<NodeInfo>, is_add: bool) {
    // Double adds and deletes of absent nodes leave the slice untouched.
    let _ = if is_add {
        slice.add(node_info)
    } else {
        slice.del(node_info)
    };
}

impl NodeSlices {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds or removes the node from every list it belongs to according to its current flags.
    /// Placeholder node infos are never indexed.
    pub fn update(&mut self, node_info: &Arc<NodeInfo>, is_add: bool) {
        if node_info.is_placeholder() {
            return;
        }

        if node_info.in_scheduler_partition() {
            op(&mut self.in_partition, node_info, is_add);
        } else {
            op(&mut self.out_of_partition, node_info, is_add);
        }
        if !node_info.pods_with_affinity().is_empty() {
            op(&mut self.have_pods_with_affinity, node_info, is_add);
        }
        if !node_info.pods_with_required_anti_affinity().is_empty() {
            op(&mut self.have_pods_with_required_anti_affinity, node_info, is_add);
        }
    }
}

/// Node store notifications waiting to be applied to a `NodeSlices`. The node store hooks
/// record into it and the owner of the slices drains it on its write paths.
#[derive(Debug, Clone, Default)]
pub struct PendingNodeSliceUpdates(Arc<Mutex<Vec<(Arc<NodeInfo>, bool)>>>);

impl PendingNodeSliceUpdates {
    pub fn record(&self, node_info: &Arc<NodeInfo>, is_add: bool) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((node_info.clone(), is_add));
    }

    /// Applies recorded updates in recording order.
    pub fn apply_to(&self, node_slices: &mut NodeSlices) {
        let updates = std::mem::take(
            &mut *self
                .0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for (node_info, is_add) in updates.iter() {
            node_slices.update(node_info, *is_add);
        }
    }
}
