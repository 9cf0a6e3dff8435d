//! Per-cycle view of the cache handed to the scheduling algorithm.
//!
//! Reads take `&self` and never lock. `assume_pod`, `forget_pod` and refreshing from the cache
//! take `&mut self`, so a snapshot has a single writer at any time while any number of threads
//! may read it between writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::cache::commonstores::pdb_store::PdbItem;
use crate::core::cache::commonstores::{make_store_switch, CommonStoresSwitch, StoreMode};
use crate::core::cache::errors::CacheError;
use crate::core::cache::handler::CacheHandler;
use crate::core::cache::node_group::{
    NodeCircle, NodeGroup, PreferredNodes, DEFAULT_NODE_CIRCLE_NAME, DEFAULT_NODE_GROUP_NAME,
};
use crate::core::cache::node_info::NodeInfo;
use crate::core::cache::node_slices::{NodeSlices, PendingNodeSliceUpdates};
use crate::core::policy::{OwnerType, PodGroup};
use crate::core::pod::CachePodInfo;

/// Read access to the node infos of a snapshot. Placeholder node infos are invisible here.
pub trait NodeInfoLister: Send + Sync {
    /// Nodes in the scheduler partition followed by the nodes out of it.
    fn list(&self) -> Vec<Arc<NodeInfo>>;
    fn in_partition_list(&self) -> Vec<Arc<NodeInfo>>;
    fn out_of_partition_list(&self) -> Vec<Arc<NodeInfo>>;
    fn have_pods_with_affinity_list(&self) -> Vec<Arc<NodeInfo>>;
    fn have_pods_with_required_anti_affinity_list(&self) -> Vec<Arc<NodeInfo>>;
    fn num_nodes(&self) -> usize;
    fn get(&self, node_name: &str) -> Result<Arc<NodeInfo>, CacheError>;
}

pub struct Snapshot {
    handler: CacheHandler,
    stores: CommonStoresSwitch,
    node_slices: NodeSlices,
    pending: PendingNodeSliceUpdates,
}

/// Builds a snapshot with empty stores and registers its node store as the handler's node
/// lookup.
pub fn new_empty_snapshot(handler: CacheHandler) -> Snapshot {
    let mut stores = make_store_switch(&handler, StoreMode::Snapshot);
    let pending = PendingNodeSliceUpdates::default();

    if let Ok(node_store) = stores.node_store_mut() {
        let added = pending.clone();
        node_store.set_after_add(Box::new(move |node_info: &Arc<NodeInfo>| {
            added.record(node_info, true)
        }));
        let deleted = pending.clone();
        node_store.set_after_delete(Box::new(move |node_info: &Arc<NodeInfo>| {
            deleted.record(node_info, false)
        }));
        handler.set_node_handler(node_store.getter());
    }

    Snapshot {
        handler,
        stores,
        node_slices: NodeSlices::new(),
        pending,
    }
}

impl Snapshot {
    pub fn new(handler: CacheHandler) -> Self {
        new_empty_snapshot(handler)
    }

    pub fn handler(&self) -> &CacheHandler {
        &self.handler
    }

    pub fn node_slices(&self) -> &NodeSlices {
        &self.node_slices
    }

    /// Generation of the node state this snapshot was last refreshed to, zero after local
    /// changes.
    pub fn generation(&self) -> u64 {
        self.stores
            .node_store()
            .map(|node_store| node_store.generation())
            .unwrap_or_default()
    }

    /// Node info by name, placeholders included.
    pub fn get_node_info(&self, node_name: &str) -> Option<Arc<NodeInfo>> {
        self.stores
            .node_store()
            .ok()
            .and_then(|node_store| node_store.get(node_name))
    }

    pub fn node_infos(&self) -> &dyn NodeInfoLister {
        self
    }

    fn sync_node_slices(&mut self) {
        self.pending.apply_to(&mut self.node_slices);
    }

    /// Places the pod on its node and takes its victims off, in every store of the snapshot.
    pub fn assume_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        let result = self.stores.range(|store| store.assume_pod(pod_info));
        self.sync_node_slices();
        result
    }

    /// Reverts `assume_pod`.
    pub fn forget_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        let result = self.stores.range(|store| store.forget_pod(pod_info));
        self.sync_node_slices();
        result
    }

    pub(crate) fn refresh_from(&mut self, cache_stores: &CommonStoresSwitch) -> Result<(), CacheError> {
        let result = cache_stores.update_snapshot(&mut self.stores);
        self.sync_node_slices();
        result
    }

    pub fn get_preemptors_by_victim(&self, node_name: &str, victim_key: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .stores
            .preemption_store()?
            .get_preemptors_by_victim(node_name, victim_key))
    }

    pub fn get_pdb_item_list(&self) -> Result<Vec<PdbItem>, CacheError> {
        Ok(self.stores.pdb_store()?.get_pdb_item_list())
    }

    pub fn get_pod_group_info(&self, key: &str) -> Result<Arc<PodGroup>, CacheError> {
        self.stores.pod_group_store()?.get_pod_group_info(key)
    }

    pub fn get_pdb_item_list_for_owner(
        &self,
        owner_type: OwnerType,
        owner_key: &str,
    ) -> Result<(bool, bool, Vec<String>), CacheError> {
        Ok(self
            .stores
            .pdb_store()?
            .get_pdbs_for_owner(owner_type, owner_key))
    }

    pub fn get_owner_labels(
        &self,
        owner_type: OwnerType,
        owner_key: &str,
    ) -> Result<BTreeMap<String, String>, CacheError> {
        Ok(self.stores.pdb_store()?.get_owner_labels(owner_type, owner_key))
    }

    pub fn get_owners_for_pdb(&self, pdb_key: &str, owner_type: OwnerType) -> Result<Vec<String>, CacheError> {
        Ok(self.stores.pdb_store()?.get_owners_for_pdb(pdb_key, owner_type))
    }

    /// The whole snapshot as one node group with a single circle and no preferred nodes.
    pub fn make_basic_node_group(&self) -> NodeGroup<'_> {
        let mut node_group = NodeGroup::new(
            DEFAULT_NODE_GROUP_NAME,
            vec![NodeCircle::new(DEFAULT_NODE_CIRCLE_NAME, self)],
        );
        node_group.set_preferred_nodes(PreferredNodes::new());
        node_group
    }
}

impl NodeInfoLister for Snapshot {
    fn list(&self) -> Vec<Arc<NodeInfo>> {
        let mut nodes = Vec::with_capacity(self.num_nodes());
        nodes.extend_from_slice(self.node_slices.in_partition.as_slice());
        nodes.extend_from_slice(self.node_slices.out_of_partition.as_slice());
        nodes
    }

    fn in_partition_list(&self) -> Vec<Arc<NodeInfo>> {
        self.node_slices.in_partition.nodes()
    }

    fn out_of_partition_list(&self) -> Vec<Arc<NodeInfo>> {
        self.node_slices.out_of_partition.nodes()
    }

    fn have_pods_with_affinity_list(&self) -> Vec<Arc<NodeInfo>> {
        self.node_slices.have_pods_with_affinity.nodes()
    }

    fn have_pods_with_required_anti_affinity_list(&self) -> Vec<Arc<NodeInfo>> {
        self.node_slices.have_pods_with_required_anti_affinity.nodes()
    }

    fn num_nodes(&self) -> usize {
        self.node_slices.in_partition.len() + self.node_slices.out_of_partition.len()
    }

    fn get(&self, node_name: &str) -> Result<Arc<NodeInfo>, CacheError> {
        self.get_node_info(node_name)
            .filter(|node_info| !node_info.is_placeholder())
            .ok_or_else(|| CacheError::NodeNotFound(node_name.to_string()))
    }
}
