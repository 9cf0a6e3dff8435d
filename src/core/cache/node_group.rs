//! Groups of candidate nodes handed to a scheduling cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::cache::errors::CacheError;
use crate::core::cache::node_info::NodeInfo;
use crate::core::cache::snapshot::NodeInfoLister;

pub const DEFAULT_NODE_GROUP_NAME: &str = "default";
pub const DEFAULT_NODE_CIRCLE_NAME: &str = "default";

/// Nodes a scheduling cycle should try first.
#[derive(Debug, Clone, Default)]
pub struct PreferredNodes {
    nodes: BTreeMap<String, Arc<NodeInfo>>,
}

impl PreferredNodes {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, node_info: Arc<NodeInfo>) {
        self.nodes.insert(node_info.name().to_string(), node_info);
    }

    pub fn remove(&mut self, node_name: &str) -> Option<Arc<NodeInfo>> {
        self.nodes.remove(node_name)
    }

    pub fn contains(&self, node_name: &str) -> bool {
        self.nodes.contains_key(node_name)
    }

    /// Preferred nodes ordered by name.
    pub fn list(&self) -> Vec<Arc<NodeInfo>> {
        self.nodes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Named view over a node lister.
#[derive(Clone, Copy)]
pub struct NodeCircle<'a> {
    name: &'a str,
    lister: &'a dyn NodeInfoLister,
}

impl<'a> NodeCircle<'a> {
    pub fn new(name: &'a str, lister: &'a dyn NodeInfoLister) -> Self {
        Self { name, lister }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn list(&self) -> Vec<Arc<NodeInfo>> {
        self.lister.list()
    }

    pub fn get(&self, node_name: &str) -> Result<Arc<NodeInfo>, CacheError> {
        self.lister.get(node_name)
    }

    pub fn num_nodes(&self) -> usize {
        self.lister.num_nodes()
    }

    pub fn lister(&self) -> &'a dyn NodeInfoLister {
        self.lister
    }
}

pub struct NodeGroup<'a> {
    name: String,
    node_circles: Vec<NodeCircle<'a>>,
    preferred_nodes: PreferredNodes,
}

impl<'a> NodeGroup<'a> {
    pub fn new(name: &str, node_circles: Vec<NodeCircle<'a>>) -> Self {
        Self {
            name: name.to_string(),
            node_circles,
            preferred_nodes: PreferredNodes::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_circles(&self) -> &[NodeCircle<'a>] {
        &self.node_circles
    }

    pub fn preferred_nodes(&self) -> &PreferredNodes {
        &self.preferred_nodes
    }

    pub fn preferred_nodes_mut(&mut self) -> &mut PreferredNodes {
        &mut self.preferred_nodes
    }

    pub fn set_preferred_nodes(&mut self, preferred_nodes: PreferredNodes) {
        self.preferred_nodes = preferred_nodes;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::cache::node_group::PreferredNodes;
    use crate::core::cache::node_info::NodeInfo;

    #[test]
    fn test_preferred_nodes() {
        let mut preferred = PreferredNodes::new();
        assert!(preferred.is_empty());

        preferred.add(Arc::new(NodeInfo::new("node2")));
        preferred.add(Arc::new(NodeInfo::new("node1")));
        preferred.add(Arc::new(NodeInfo::new("node1")));
        assert_eq!(2, preferred.len());
        assert!(preferred.contains("node1"));
        assert_eq!(
            vec!["node1", "node2"],
            preferred
                .list()
                .iter()
                .map(|node_info| node_info.name().to_string())
                .collect::<Vec<_>>()
        );

        assert!(preferred.remove("node1").is_some());
        assert!(preferred.remove("node1").is_none());
        assert!(!preferred.contains("node1"));
    }
}
