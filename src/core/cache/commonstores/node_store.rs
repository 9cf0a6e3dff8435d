//! Node infos by node name, and in cache mode the life cycle of every pod the cache knows.
//!
//! Node infos are shared as `Arc<NodeInfo>` between the cache, its snapshots and the published
//! index behind `getter()`. A node info is never mutated in place: every change clones it,
//! applies the change, stamps a generation and swaps the new value in. Readers holding the old
//! value keep a consistent view.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use log::{debug, warn};

use crate::core::cache::commonstores::{CommonStore, StoreMode, NODE_STORE_NAME};
use crate::core::cache::errors::CacheError;
use crate::core::cache::handler::{CacheHandler, NodeHandler};
use crate::core::cache::node_info::NodeInfo;
use crate::core::node::{CustomNodeResource, NMNode, Node};
use crate::core::pod::{CachePodInfo, Pod};

/// Callback fired with the node info entering (`after_add`) or leaving (`after_delete`) the
/// store.
pub type NodeInfoHook = Box<dyn FnMut(&Arc<NodeInfo>) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
enum PodState {
    /// Placed by the scheduler, not yet confirmed by an add event.
    Assumed {
        binding_finished: bool,
        deadline: Option<Instant>,
    },
    /// Confirmed by an add event.
    Added,
    /// Displaced from its node by an assumed preemptor.
    Victim { preemptor: String },
}

#[derive(Debug, Clone)]
struct PodItem {
    pod: Arc<Pod>,
    node_name: String,
    state: PodState,
}

pub struct NodeStore {
    handler: CacheHandler,
    mode: StoreMode,

    node_infos: HashMap<String, Arc<NodeInfo>>,
    published: Arc<RwLock<HashMap<String, Arc<NodeInfo>>>>,

    // Pod key -> pod life cycle. Tracked in cache mode only.
    pod_states: HashMap<String, PodItem>,

    generation: u64,

    after_add: Option<NodeInfoHook>,
    after_delete: Option<NodeInfoHook>,
}

fn pod_node_name(pod: &Pod) -> Result<&str, CacheError> {
    pod.node_name()
        .ok_or_else(|| CacheError::PodNotAssigned(pod.key()))
}

impl NodeStore {
    pub fn new(handler: CacheHandler, mode: StoreMode) -> Self {
        Self {
            handler,
            mode,
            node_infos: HashMap::new(),
            published: Default::default(),
            pod_states: HashMap::new(),
            generation: mode.initial_generation(),
            after_add: None,
            after_delete: None,
        }
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_after_add(&mut self, hook: NodeInfoHook) {
        self.after_add = Some(hook);
    }

    pub fn set_after_delete(&mut self, hook: NodeInfoHook) {
        self.after_delete = Some(hook);
    }

    pub fn get(&self, node_name: &str) -> Option<Arc<NodeInfo>> {
        self.node_infos.get(node_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.node_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_infos.is_empty()
    }

    pub fn node_infos(&self) -> impl Iterator<Item = &Arc<NodeInfo>> {
        self.node_infos.values()
    }

    /// Number of pods placed on node infos. Victims are not counted.
    pub fn pod_count(&self) -> usize {
        self.node_infos.values().map(|node_info| node_info.pod_count()).sum()
    }

    /// Lookup closure over the published copy of the node infos. It stays valid after the store
    /// is moved and may be called from any thread.
    pub fn getter(&self) -> NodeHandler {
        let published = self.published.clone();
        Arc::new(move |node_name: &str| {
            published
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(node_name)
                .cloned()
        })
    }

    pub fn is_assumed_pod(&self, pod_key: &str) -> bool {
        matches!(
            self.pod_states.get(pod_key).map(|item| &item.state),
            Some(PodState::Assumed { .. })
        )
    }

    pub fn is_victim_pod(&self, pod_key: &str) -> bool {
        matches!(
            self.pod_states.get(pod_key).map(|item| &item.state),
            Some(PodState::Victim { .. })
        )
    }

    /// Node the cache accounts the pod on, if the pod is known.
    pub fn pod_node(&self, pod_key: &str) -> Option<&str> {
        self.pod_states
            .get(pod_key)
            .map(|item| item.node_name.as_str())
    }

    fn next_generation(&mut self) -> u64 {
        match self.mode {
            StoreMode::Cache => {
                self.generation += 1;
                self.generation
            }
            // Local changes must never match a cache generation.
            StoreMode::Snapshot => {
                self.generation = 0;
                0
            }
        }
    }

    fn fire_after_add(&mut self, node_info: &Arc<NodeInfo>) {
        if let Some(hook) = self.after_add.as_mut() {
            hook(node_info);
        }
    }

    fn fire_after_delete(&mut self, node_info: &Arc<NodeInfo>) {
        if let Some(hook) = self.after_delete.as_mut() {
            hook(node_info);
        }
    }

    fn publish(&self, node_name: &str, node_info: Option<&Arc<NodeInfo>>) {
        let mut published = self
            .published
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match node_info {
            Some(node_info) => {
                published.insert(node_name.to_string(), node_info.clone());
            }
            None => {
                published.remove(node_name);
            }
        }
    }

    /// Swaps the entry for `node_name`. Hooks see the old value leave before the new one comes
    /// in; an empty node info drops the entry.
    fn set_entry(&mut self, node_name: &str, node_info: Option<Arc<NodeInfo>>) {
        let node_info = node_info.filter(|node_info| !node_info.is_empty());
        let old = match &node_info {
            Some(node_info) => self
                .node_infos
                .insert(node_name.to_string(), node_info.clone()),
            None => self.node_infos.remove(node_name),
        };
        self.publish(node_name, node_info.as_ref());

        if let Some(old) = old {
            self.fire_after_delete(&old);
        }
        if let Some(node_info) = node_info {
            self.fire_after_add(&node_info);
        }
    }

    /// Copy-on-write update of one node info, created empty if absent. Nothing is committed if
    /// `f` fails.
    fn mutate<F, R>(&mut self, node_name: &str, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&mut NodeInfo) -> Result<R, CacheError>,
    {
        let mut node_info = match self.node_infos.get(node_name) {
            Some(node_info) => NodeInfo::clone(node_info),
            None => NodeInfo::new(node_name),
        };
        let result = f(&mut node_info)?;
        let generation = self.next_generation();
        node_info.set_generation(generation);
        self.set_entry(node_name, Some(Arc::new(node_info)));
        Ok(result)
    }

    fn place_pod(&mut self, node_name: &str, pod: &Arc<Pod>) -> Result<(), CacheError> {
        self.mutate(node_name, |node_info| {
            if node_info.add_pod(pod.clone()) {
                Ok(())
            } else {
                Err(CacheError::PodAlreadyExists(pod.key()))
            }
        })
    }

    fn take_pod(&mut self, node_name: &str, pod_key: &str) -> Result<Arc<Pod>, CacheError> {
        if !self.node_infos.contains_key(node_name) {
            return Err(CacheError::NodeNotFound(node_name.to_string()));
        }
        self.mutate(node_name, |node_info| {
            node_info
                .remove_pod(pod_key)
                .ok_or_else(|| CacheError::PodNotFoundOnNode {
                    pod: pod_key.to_string(),
                    node: node_name.to_string(),
                })
        })
    }

    fn in_partition(&self, scheduler_name: &str) -> bool {
        scheduler_name == self.handler.scheduler_name()
    }

    pub fn add_nm_node(&mut self, nm_node: &Arc<NMNode>) -> Result<(), CacheError> {
        let in_partition = self.in_partition(nm_node.scheduler_name());
        debug!(
            "{} adds NM node {:?}, in partition: {}",
            NODE_STORE_NAME,
            nm_node.name(),
            in_partition
        );
        self.mutate(nm_node.name(), |node_info| {
            node_info.set_nm_node(nm_node.clone(), in_partition);
            Ok(())
        })
    }

    pub fn update_nm_node(
        &mut self,
        old_nm_node: &Arc<NMNode>,
        new_nm_node: &Arc<NMNode>,
    ) -> Result<(), CacheError> {
        if old_nm_node.name() != new_nm_node.name() {
            self.remove_nm_node(old_nm_node)?;
        }
        self.add_nm_node(new_nm_node)
    }

    pub fn remove_nm_node(&mut self, nm_node: &Arc<NMNode>) -> Result<(), CacheError> {
        let name = nm_node.name();
        if !self.node_infos.contains_key(name) {
            return Err(CacheError::NodeNotFound(name.to_string()));
        }
        self.mutate(name, |node_info| {
            node_info.remove_nm_node();
            Ok(())
        })
    }

    pub fn add_cnr(&mut self, cnr: &Arc<CustomNodeResource>) -> Result<(), CacheError> {
        self.mutate(cnr.node_name(), |node_info| {
            node_info.set_cnr(cnr.clone());
            Ok(())
        })
    }

    pub fn update_cnr(
        &mut self,
        old_cnr: &Arc<CustomNodeResource>,
        new_cnr: &Arc<CustomNodeResource>,
    ) -> Result<(), CacheError> {
        if old_cnr.node_name() != new_cnr.node_name() {
            self.remove_cnr(old_cnr)?;
        }
        self.add_cnr(new_cnr)
    }

    pub fn remove_cnr(&mut self, cnr: &Arc<CustomNodeResource>) -> Result<(), CacheError> {
        let name = cnr.node_name();
        if !self.node_infos.contains_key(name) {
            return Err(CacheError::NodeNotFound(name.to_string()));
        }
        self.mutate(name, |node_info| {
            node_info.remove_cnr();
            Ok(())
        })
    }

    /// Starts the expiration countdown of an assumed pod.
    pub fn finish_binding(&mut self, pod: &Pod, now: Instant) -> Result<(), CacheError> {
        let key = pod.key();
        let ttl = self.handler.ttl();
        let item = self
            .pod_states
            .get_mut(&key)
            .ok_or_else(|| CacheError::PodNotFound(key.clone()))?;
        match &mut item.state {
            PodState::Assumed {
                binding_finished,
                deadline,
            } => {
                *binding_finished = true;
                *deadline = Some(now + ttl);
                Ok(())
            }
            _ => Err(CacheError::PodNotAssumed(key)),
        }
    }

    /// Assumed pods whose binding finished and whose deadline passed, with the victims they
    /// displaced, ordered by pod key.
    pub fn expired_assumed_pods(&self, now: Instant) -> Vec<CachePodInfo> {
        let mut expired: Vec<&String> = self
            .pod_states
            .iter()
            .filter(|(_, item)| match item.state {
                PodState::Assumed {
                    binding_finished: true,
                    deadline: Some(deadline),
                } => deadline <= now,
                _ => false,
            })
            .map(|(key, _)| key)
            .collect();
        expired.sort();

        expired
            .into_iter()
            .map(|key| CachePodInfo {
                pod: self.pod_states[key].pod.clone(),
                victims: self
                    .victims_of(key)
                    .into_iter()
                    .map(|victim| victim.pod.clone())
                    .collect(),
            })
            .collect()
    }

    fn victims_of(&self, preemptor_key: &str) -> Vec<&PodItem> {
        let mut victims: Vec<(&String, &PodItem)> = self
            .pod_states
            .iter()
            .filter(|(_, item)| match &item.state {
                PodState::Victim { preemptor } => preemptor == preemptor_key,
                _ => false,
            })
            .collect();
        victims.sort_by(|a, b| a.0.cmp(b.0));
        victims.into_iter().map(|(_, item)| item).collect()
    }

    /// Drops an assumed pod and puts back every victim it displaced.
    fn forget_assumed(&mut self, key: &str) -> Result<(), CacheError> {
        let item = match self.pod_states.get(key) {
            Some(item) => item.clone(),
            None => return Err(CacheError::PodNotFound(key.to_string())),
        };
        self.take_pod(&item.node_name, key)?;
        self.pod_states.remove(key);

        let victims: Vec<String> = self
            .victims_of(key)
            .into_iter()
            .map(|victim| victim.pod.key())
            .collect();
        for victim_key in victims {
            let Some(victim) = self.pod_states.get(&victim_key).cloned() else {
                continue;
            };
            self.place_pod(&victim.node_name, &victim.pod)?;
            if let Some(victim) = self.pod_states.get_mut(&victim_key) {
                victim.state = PodState::Added;
            }
        }
        Ok(())
    }

    fn cache_add_pod(&mut self, pod: &Arc<Pod>) -> Result<(), CacheError> {
        let key = pod.key();
        let node_name = pod_node_name(pod)?.to_string();

        match self.pod_states.get(&key).cloned() {
            Some(PodItem {
                state: PodState::Assumed { .. },
                node_name: assumed_node,
                ..
            }) => {
                if assumed_node != node_name {
                    warn!(
                        "Pod {:?} was assumed on node {:?} but added on node {:?}",
                        key, assumed_node, node_name
                    );
                }
                self.take_pod(&assumed_node, &key)?;
                self.place_pod(&node_name, pod)?;
            }
            Some(_) => return Err(CacheError::PodAlreadyExists(key)),
            None => self.place_pod(&node_name, pod)?,
        }

        debug!("{} added pod {:?} on node {:?}", NODE_STORE_NAME, key, node_name);
        self.pod_states.insert(
            key,
            PodItem {
                pod: pod.clone(),
                node_name,
                state: PodState::Added,
            },
        );
        Ok(())
    }

    fn cache_update_pod(&mut self, old_pod: &Arc<Pod>, new_pod: &Arc<Pod>) -> Result<(), CacheError> {
        let key = old_pod.key();
        let item = self
            .pod_states
            .get(&key)
            .cloned()
            .ok_or_else(|| CacheError::PodNotFound(key.clone()))?;

        match item.state {
            PodState::Assumed { .. } => Err(CacheError::PodAssumed(key)),
            PodState::Victim { .. } => {
                if let Some(item) = self.pod_states.get_mut(&key) {
                    item.pod = new_pod.clone();
                }
                Ok(())
            }
            PodState::Added => {
                let node_name = new_pod
                    .node_name()
                    .unwrap_or(item.node_name.as_str())
                    .to_string();
                self.take_pod(&item.node_name, &key)?;
                self.place_pod(&node_name, new_pod)?;
                self.pod_states.remove(&key);
                self.pod_states.insert(
                    new_pod.key(),
                    PodItem {
                        pod: new_pod.clone(),
                        node_name,
                        state: PodState::Added,
                    },
                );
                Ok(())
            }
        }
    }

    fn cache_remove_pod(&mut self, pod: &Arc<Pod>) -> Result<(), CacheError> {
        let key = pod.key();
        let item = self
            .pod_states
            .get(&key)
            .cloned()
            .ok_or_else(|| CacheError::PodNotFound(key.clone()))?;

        match item.state {
            // Victims of a deleted preemptor go back to their nodes.
            PodState::Assumed { .. } => self.forget_assumed(&key)?,
            PodState::Victim { .. } => {
                self.pod_states.remove(&key);
            }
            PodState::Added => {
                self.take_pod(&item.node_name, &key)?;
                self.pod_states.remove(&key);
            }
        }
        debug!("{} removed pod {:?}", NODE_STORE_NAME, key);
        Ok(())
    }

    fn cache_assume_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        let key = pod_info.pod.key();
        let node_name = pod_node_name(&pod_info.pod)?.to_string();
        if self.pod_states.contains_key(&key) {
            return Err(CacheError::PodAlreadyExists(key));
        }
        for victim in pod_info.victims.iter() {
            let victim_key = victim.key();
            match self.pod_states.get(&victim_key) {
                Some(PodItem {
                    state: PodState::Added,
                    ..
                }) => {}
                _ => {
                    return Err(CacheError::PodNotFoundOnNode {
                        pod: victim_key,
                        node: node_name,
                    })
                }
            }
        }

        self.place_pod(&node_name, &pod_info.pod)?;
        self.pod_states.insert(
            key.clone(),
            PodItem {
                pod: pod_info.pod.clone(),
                node_name,
                state: PodState::Assumed {
                    binding_finished: false,
                    deadline: None,
                },
            },
        );

        for victim in pod_info.victims.iter() {
            let victim_key = victim.key();
            let Some(victim_node) = self.pod_node(&victim_key).map(str::to_string) else {
                continue;
            };
            self.take_pod(&victim_node, &victim_key)?;
            if let Some(item) = self.pod_states.get_mut(&victim_key) {
                item.state = PodState::Victim {
                    preemptor: key.clone(),
                };
            }
        }
        debug!(
            "{} assumed pod {:?} with {} victims",
            NODE_STORE_NAME,
            key,
            pod_info.victims.len()
        );
        Ok(())
    }

    fn cache_forget_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        let key = pod_info.pod.key();
        let item = self
            .pod_states
            .get(&key)
            .ok_or_else(|| CacheError::PodNotFound(key.clone()))?;
        if !matches!(item.state, PodState::Assumed { .. }) {
            return Err(CacheError::PodNotAssumed(key));
        }
        if let Some(reported) = pod_info.pod.node_name() {
            if reported != item.node_name {
                return Err(CacheError::PodNodeMismatch {
                    pod: key,
                    assumed: item.node_name.clone(),
                    reported: reported.to_string(),
                });
            }
        }
        self.forget_assumed(&key)
    }

    fn snapshot_assume_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        let key = pod_info.pod.key();
        let node_name = pod_node_name(&pod_info.pod)?.to_string();

        if self
            .node_infos
            .get(&node_name)
            .is_some_and(|node_info| node_info.has_pod(&key))
        {
            return Err(CacheError::PodAlreadyExists(key));
        }
        let mut victims = Vec::with_capacity(pod_info.victims.len());
        for victim in pod_info.victims.iter() {
            let victim_node = victim.node_name().unwrap_or(node_name.as_str()).to_string();
            let victim_key = victim.key();
            if !self
                .node_infos
                .get(&victim_node)
                .is_some_and(|node_info| node_info.has_pod(&victim_key))
            {
                return Err(CacheError::PodNotFoundOnNode {
                    pod: victim_key,
                    node: victim_node,
                });
            }
            victims.push((victim_node, victim_key));
        }

        for (victim_node, victim_key) in victims.iter() {
            self.take_pod(victim_node, victim_key)?;
        }
        self.place_pod(&node_name, &pod_info.pod)
    }

    fn snapshot_forget_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        let node_name = pod_node_name(&pod_info.pod)?.to_string();
        self.take_pod(&node_name, &pod_info.pod.key())?;

        for victim in pod_info.victims.iter() {
            let victim_node = victim.node_name().unwrap_or(node_name.as_str()).to_string();
            match self.place_pod(&victim_node, victim) {
                Ok(()) | Err(CacheError::PodAlreadyExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Makes `target` equal to this store. Entries missing here are deleted from `target`,
    /// entries with a different generation are replaced. Hooks of `target` fire for both.
    pub fn update_snapshot(&self, target: &mut NodeStore) {
        if self.generation == target.generation {
            return;
        }

        let mut stale: Vec<String> = target
            .node_infos
            .keys()
            .filter(|node_name| !self.node_infos.contains_key(*node_name))
            .cloned()
            .collect();
        stale.sort();
        for node_name in stale {
            target.set_entry(&node_name, None);
        }

        let mut names: Vec<&String> = self.node_infos.keys().collect();
        names.sort();
        for node_name in names {
            let node_info = &self.node_infos[node_name];
            let up_to_date = target
                .node_infos
                .get(node_name)
                .is_some_and(|existing| existing.generation() == node_info.generation());
            if !up_to_date {
                target.set_entry(node_name, Some(node_info.clone()));
            }
        }
        target.generation = self.generation;
    }
}

impl CommonStore for NodeStore {
    fn name(&self) -> &'static str {
        NODE_STORE_NAME
    }

    fn add_pod(&mut self, pod: &Arc<Pod>) -> Result<(), CacheError> {
        match self.mode {
            StoreMode::Cache => self.cache_add_pod(pod),
            StoreMode::Snapshot => {
                let node_name = pod_node_name(pod)?.to_string();
                self.place_pod(&node_name, pod)
            }
        }
    }

    fn update_pod(&mut self, old_pod: &Arc<Pod>, new_pod: &Arc<Pod>) -> Result<(), CacheError> {
        match self.mode {
            StoreMode::Cache => self.cache_update_pod(old_pod, new_pod),
            StoreMode::Snapshot => {
                let old_node = pod_node_name(old_pod)?.to_string();
                let new_node = new_pod.node_name().unwrap_or(old_node.as_str()).to_string();
                self.take_pod(&old_node, &old_pod.key())?;
                self.place_pod(&new_node, new_pod)
            }
        }
    }

    fn remove_pod(&mut self, pod: &Arc<Pod>) -> Result<(), CacheError> {
        match self.mode {
            StoreMode::Cache => self.cache_remove_pod(pod),
            StoreMode::Snapshot => {
                let node_name = pod_node_name(pod)?.to_string();
                self.take_pod(&node_name, &pod.key()).map(|_| ())
            }
        }
    }

    fn add_node(&mut self, node: &Arc<Node>) -> Result<(), CacheError> {
        let in_partition = self.in_partition(node.scheduler_name());
        debug!(
            "{} adds node {:?}, in partition: {}",
            NODE_STORE_NAME,
            node.name(),
            in_partition
        );
        self.mutate(node.name(), |node_info| {
            node_info.set_node(node.clone(), in_partition);
            Ok(())
        })
    }

    fn update_node(&mut self, old_node: &Arc<Node>, new_node: &Arc<Node>) -> Result<(), CacheError> {
        if old_node.name() != new_node.name() {
            self.remove_node(old_node)?;
        }
        self.add_node(new_node)
    }

    /// Pods, the NM node or the CNR keep the entry alive as a placeholder.
    fn remove_node(&mut self, node: &Arc<Node>) -> Result<(), CacheError> {
        let name = node.name();
        if !self.node_infos.contains_key(name) {
            return Err(CacheError::NodeNotFound(name.to_string()));
        }
        debug!("{} removes node {:?}", NODE_STORE_NAME, name);
        self.mutate(name, |node_info| {
            node_info.remove_node();
            Ok(())
        })
    }

    fn assume_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        match self.mode {
            StoreMode::Cache => self.cache_assume_pod(pod_info),
            StoreMode::Snapshot => self.snapshot_assume_pod(pod_info),
        }
    }

    fn forget_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        match self.mode {
            StoreMode::Cache => self.cache_forget_pod(pod_info),
            StoreMode::Snapshot => self.snapshot_forget_pod(pod_info),
        }
    }
}
