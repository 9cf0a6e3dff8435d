//! Long-lived scheduler cache. Watch events go in, snapshots are refreshed from it before each
//! scheduling cycle.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::core::cache::commonstores::{make_store_switch, CommonStoresSwitch, StoreMode};
use crate::core::cache::errors::CacheError;
use crate::core::cache::handler::CacheHandler;
use crate::core::cache::node_info::NodeInfo;
use crate::core::cache::snapshot::Snapshot;
use crate::core::events::ClusterEvent;
use crate::core::node::{CustomNodeResource, NMNode, Node};
use crate::core::pod::{CachePodInfo, Pod};
use crate::core::policy::{Owner, PodDisruptionBudget, PodGroup};

pub struct Cache {
    handler: CacheHandler,
    stores: CommonStoresSwitch,
}

impl Cache {
    pub fn new(handler: CacheHandler) -> Self {
        let stores = make_store_switch(&handler, StoreMode::Cache);
        Self { handler, stores }
    }

    pub fn handler(&self) -> &CacheHandler {
        &self.handler
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), CacheError> {
        let node = Arc::new(node);
        self.stores.range(|store| store.add_node(&node))
    }

    pub fn update_node(&mut self, old_node: Node, new_node: Node) -> Result<(), CacheError> {
        let (old_node, new_node) = (Arc::new(old_node), Arc::new(new_node));
        self.stores
            .range(|store| store.update_node(&old_node, &new_node))
    }

    pub fn remove_node(&mut self, node: Node) -> Result<(), CacheError> {
        let node = Arc::new(node);
        self.stores.range(|store| store.remove_node(&node))
    }

    pub fn add_nm_node(&mut self, nm_node: NMNode) -> Result<(), CacheError> {
        self.stores.node_store_mut()?.add_nm_node(&Arc::new(nm_node))
    }

    pub fn update_nm_node(&mut self, old_nm_node: NMNode, new_nm_node: NMNode) -> Result<(), CacheError> {
        self.stores
            .node_store_mut()?
            .update_nm_node(&Arc::new(old_nm_node), &Arc::new(new_nm_node))
    }

    pub fn remove_nm_node(&mut self, nm_node: NMNode) -> Result<(), CacheError> {
        self.stores
            .node_store_mut()?
            .remove_nm_node(&Arc::new(nm_node))
    }

    pub fn add_cnr(&mut self, cnr: CustomNodeResource) -> Result<(), CacheError> {
        self.stores.node_store_mut()?.add_cnr(&Arc::new(cnr))
    }

    pub fn update_cnr(
        &mut self,
        old_cnr: CustomNodeResource,
        new_cnr: CustomNodeResource,
    ) -> Result<(), CacheError> {
        self.stores
            .node_store_mut()?
            .update_cnr(&Arc::new(old_cnr), &Arc::new(new_cnr))
    }

    pub fn remove_cnr(&mut self, cnr: CustomNodeResource) -> Result<(), CacheError> {
        self.stores.node_store_mut()?.remove_cnr(&Arc::new(cnr))
    }

    pub fn add_pod(&mut self, pod: Pod) -> Result<(), CacheError> {
        let pod = Arc::new(pod);
        self.stores.range(|store| store.add_pod(&pod))
    }

    pub fn update_pod(&mut self, old_pod: Pod, new_pod: Pod) -> Result<(), CacheError> {
        let (old_pod, new_pod) = (Arc::new(old_pod), Arc::new(new_pod));
        self.stores
            .range(|store| store.update_pod(&old_pod, &new_pod))
    }

    pub fn remove_pod(&mut self, pod: Pod) -> Result<(), CacheError> {
        let pod = Arc::new(pod);
        self.stores.range(|store| store.remove_pod(&pod))
    }

    pub fn assume_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        self.stores.range(|store| store.assume_pod(pod_info))
    }

    pub fn forget_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        self.stores.range(|store| store.forget_pod(pod_info))
    }

    /// Binding of an assumed pod finished, it expires after the handler's ttl unless an add
    /// event confirms it first.
    pub fn finish_binding(&mut self, pod: &Pod, now: Instant) -> Result<(), CacheError> {
        self.stores.node_store_mut()?.finish_binding(pod, now)
    }

    pub fn is_assumed_pod(&self, pod_key: &str) -> bool {
        self.stores
            .node_store()
            .is_ok_and(|node_store| node_store.is_assumed_pod(pod_key))
    }

    /// Forgets every expired assumed pod and returns their keys.
    pub fn cleanup_assumed_pods(&mut self, now: Instant) -> Vec<String> {
        let expired = match self.stores.node_store() {
            Ok(node_store) => node_store.expired_assumed_pods(now),
            Err(_) => return Vec::new(),
        };

        let mut keys = Vec::with_capacity(expired.len());
        for pod_info in expired {
            let key = pod_info.pod.key();
            info!("Assumed pod {:?} expired after binding", key);
            if let Err(err) = self.forget_pod(&pod_info) {
                warn!("Failed to forget expired pod {:?}: {}", key, err);
            }
            keys.push(key);
        }
        keys
    }

    pub fn add_pdb(&mut self, pdb: PodDisruptionBudget) -> Result<(), CacheError> {
        self.stores.pdb_store_mut()?.add_pdb(&Arc::new(pdb))
    }

    pub fn update_pdb(
        &mut self,
        old_pdb: PodDisruptionBudget,
        new_pdb: PodDisruptionBudget,
    ) -> Result<(), CacheError> {
        self.stores
            .pdb_store_mut()?
            .update_pdb(&Arc::new(old_pdb), &Arc::new(new_pdb))
    }

    pub fn delete_pdb(&mut self, pdb: PodDisruptionBudget) -> Result<(), CacheError> {
        self.stores.pdb_store_mut()?.delete_pdb(&pdb)
    }

    pub fn add_owner(&mut self, owner: Owner) -> Result<(), CacheError> {
        self.stores.pdb_store_mut()?.add_owner(&owner)
    }

    pub fn update_owner(&mut self, old_owner: Owner, new_owner: Owner) -> Result<(), CacheError> {
        self.stores
            .pdb_store_mut()?
            .update_owner(&old_owner, &new_owner)
    }

    pub fn delete_owner(&mut self, owner: Owner) -> Result<(), CacheError> {
        self.stores.pdb_store_mut()?.delete_owner(&owner)
    }

    pub fn add_pod_group(&mut self, pod_group: PodGroup) -> Result<(), CacheError> {
        self.stores
            .pod_group_store_mut()?
            .add_pod_group(&Arc::new(pod_group))
    }

    pub fn update_pod_group(&mut self, old_pod_group: PodGroup, new_pod_group: PodGroup) -> Result<(), CacheError> {
        self.stores
            .pod_group_store_mut()?
            .update_pod_group(&Arc::new(old_pod_group), &Arc::new(new_pod_group))
    }

    pub fn delete_pod_group(&mut self, pod_group: PodGroup) -> Result<(), CacheError> {
        self.stores
            .pod_group_store_mut()?
            .delete_pod_group(&pod_group)
    }

    /// Applies one watch event.
    pub fn handle(&mut self, event: ClusterEvent) -> Result<(), CacheError> {
        debug!("Cache handles {} event", event.kind());
        match event {
            ClusterEvent::AddNode { node } => self.add_node(node),
            ClusterEvent::UpdateNode { old_node, new_node } => self.update_node(old_node, new_node),
            ClusterEvent::RemoveNode { node } => self.remove_node(node),
            ClusterEvent::AddNMNode { nm_node } => self.add_nm_node(nm_node),
            ClusterEvent::UpdateNMNode {
                old_nm_node,
                new_nm_node,
            } => self.update_nm_node(old_nm_node, new_nm_node),
            ClusterEvent::RemoveNMNode { nm_node } => self.remove_nm_node(nm_node),
            ClusterEvent::AddCNR { cnr } => self.add_cnr(cnr),
            ClusterEvent::UpdateCNR { old_cnr, new_cnr } => self.update_cnr(old_cnr, new_cnr),
            ClusterEvent::RemoveCNR { cnr } => self.remove_cnr(cnr),
            ClusterEvent::AddPod { pod } => self.add_pod(pod),
            ClusterEvent::UpdatePod { old_pod, new_pod } => self.update_pod(old_pod, new_pod),
            ClusterEvent::RemovePod { pod } => self.remove_pod(pod),
            ClusterEvent::AssumePod { pod, victims } => {
                self.assume_pod(&CachePodInfo::with_victims(pod, victims))
            }
            ClusterEvent::ForgetPod { pod, victims } => {
                self.forget_pod(&CachePodInfo::with_victims(pod, victims))
            }
            ClusterEvent::FinishBinding { pod } => self.finish_binding(&pod, Instant::now()),
            ClusterEvent::AddPdb { pdb } => self.add_pdb(pdb),
            ClusterEvent::UpdatePdb { old_pdb, new_pdb } => self.update_pdb(old_pdb, new_pdb),
            ClusterEvent::DeletePdb { pdb } => self.delete_pdb(pdb),
            ClusterEvent::AddOwner { owner } => self.add_owner(owner),
            ClusterEvent::UpdateOwner {
                old_owner,
                new_owner,
            } => self.update_owner(old_owner, new_owner),
            ClusterEvent::DeleteOwner { owner } => self.delete_owner(owner),
            ClusterEvent::AddPodGroup { pod_group } => self.add_pod_group(pod_group),
            ClusterEvent::UpdatePodGroup {
                old_pod_group,
                new_pod_group,
            } => self.update_pod_group(old_pod_group, new_pod_group),
            ClusterEvent::DeletePodGroup { pod_group } => self.delete_pod_group(pod_group),
        }
    }

    /// Brings the snapshot up to date. Snapshot stores with no counterpart in the cache are left
    /// untouched.
    pub fn update_snapshot(&self, snapshot: &mut Snapshot) -> Result<(), CacheError> {
        snapshot.refresh_from(&self.stores)
    }

    /// Number of node infos, placeholders included.
    pub fn node_count(&self) -> usize {
        self.stores
            .node_store()
            .map(|node_store| node_store.len())
            .unwrap_or_default()
    }

    pub fn pod_count(&self) -> usize {
        self.stores
            .node_store()
            .map(|node_store| node_store.pod_count())
            .unwrap_or_default()
    }

    pub fn get_node_info(&self, node_name: &str) -> Option<Arc<NodeInfo>> {
        self.stores
            .node_store()
            .ok()
            .and_then(|node_store| node_store.get(node_name))
    }
}

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `cleanup_assumed_pods` every handler period until the handler's stop signal fires.
pub fn spawn_assumed_pod_cleanup(cache: Arc<Mutex<Cache>>) -> JoinHandle<()> {
    let handler = cache
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .handler()
        .clone();

    thread::spawn(move || {
        let stop_signal = handler.stop_signal();
        let mut next_run = Instant::now() + handler.period();
        while !stop_signal.is_stopped() {
            let now = Instant::now();
            if now < next_run {
                thread::sleep(STOP_POLL_INTERVAL.min(next_run - now));
                continue;
            }
            let expired = cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .cleanup_assumed_pods(now);
            if !expired.is_empty() {
                debug!("Cleanup expired {} assumed pods", expired.len());
            }
            next_run = now + handler.period();
        }
    })
}
