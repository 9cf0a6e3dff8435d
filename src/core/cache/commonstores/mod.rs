//! Stores kept by the cache and by snapshots, and the switch dispatching events to them.

pub mod node_store;
pub mod pdb_store;
pub mod pod_group_store;
pub mod preemption_store;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::cache::errors::CacheError;
use crate::core::cache::handler::{CacheHandler, OptionalStore};
use crate::core::node::Node;
use crate::core::pod::{CachePodInfo, Pod};

use node_store::NodeStore;
use pdb_store::PdbStore;
use pod_group_store::PodGroupStore;
use preemption_store::PreemptionStore;

pub const NODE_STORE_NAME: &str = "NodeStore";
pub const PDB_STORE_NAME: &str = "PdbStore";
pub const POD_GROUP_STORE_NAME: &str = "PodGroupStore";
pub const PREEMPTION_STORE_NAME: &str = "PreemptionStore";

/// Whether a store backs the long-lived cache or a scheduling snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Cache,
    Snapshot,
}

impl StoreMode {
    /// Cache stores start above zero, the generation snapshots reset to after local changes.
    pub(crate) fn initial_generation(self) -> u64 {
        match self {
            StoreMode::Cache => 1,
            StoreMode::Snapshot => 0,
        }
    }
}

/// Event interface every store exposes to the switch. Stores override only the events they
/// govern, the rest are accepted and ignored.
pub trait CommonStore {
    fn name(&self) -> &'static str;

    fn add_pod(&mut self, _pod: &Arc<Pod>) -> Result<(), CacheError> {
        Ok(())
    }

    fn update_pod(&mut self, _old_pod: &Arc<Pod>, _new_pod: &Arc<Pod>) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove_pod(&mut self, _pod: &Arc<Pod>) -> Result<(), CacheError> {
        Ok(())
    }

    fn add_node(&mut self, _node: &Arc<Node>) -> Result<(), CacheError> {
        Ok(())
    }

    fn update_node(&mut self, _old_node: &Arc<Node>, _new_node: &Arc<Node>) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove_node(&mut self, _node: &Arc<Node>) -> Result<(), CacheError> {
        Ok(())
    }

    fn assume_pod(&mut self, _pod_info: &CachePodInfo) -> Result<(), CacheError> {
        Ok(())
    }

    fn forget_pod(&mut self, _pod_info: &CachePodInfo) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Closed set of stores a switch can hold.
pub enum Store {
    Node(NodeStore),
    Pdb(PdbStore),
    PodGroup(PodGroupStore),
    Preemption(PreemptionStore),
}

impl Store {
    pub fn name(&self) -> &'static str {
        self.as_common_store().name()
    }

    pub fn as_common_store(&self) -> &dyn CommonStore {
        match self {
            Store::Node(store) => store,
            Store::Pdb(store) => store,
            Store::PodGroup(store) => store,
            Store::Preemption(store) => store,
        }
    }

    pub fn as_common_store_mut(&mut self) -> &mut dyn CommonStore {
        match self {
            Store::Node(store) => store,
            Store::Pdb(store) => store,
            Store::PodGroup(store) => store,
            Store::Preemption(store) => store,
        }
    }

    /// Brings `target`, a snapshot store of the same kind, up to date with this store.
    pub fn update_snapshot(&self, target: &mut Store) -> Result<(), CacheError> {
        match (self, target) {
            (Store::Node(store), Store::Node(target)) => store.update_snapshot(target),
            (Store::Pdb(store), Store::Pdb(target)) => store.update_snapshot(target),
            (Store::PodGroup(store), Store::PodGroup(target)) => store.update_snapshot(target),
            (Store::Preemption(store), Store::Preemption(target)) => store.update_snapshot(target),
            (store, target) => {
                return Err(CacheError::StoreMismatch {
                    source_store: store.name(),
                    target: target.name(),
                })
            }
        }
        Ok(())
    }
}

/// Ordered collection of stores. Events are delivered in registration order.
#[derive(Default)]
pub struct CommonStoresSwitch {
    stores: Vec<Store>,
    index: HashMap<&'static str, usize>,
}

macro_rules! typed_store_accessors {
    ($($getter:ident, $getter_mut:ident, $variant:ident, $store:ty, $name:expr;)*) => {
        $(
            pub fn $getter(&self) -> Result<&$store, CacheError> {
                match self.find($name) {
                    Some(Store::$variant(store)) => Ok(store),
                    _ => Err(CacheError::StoreNotRegistered($name)),
                }
            }

            pub fn $getter_mut(&mut self) -> Result<&mut $store, CacheError> {
                match self.find_mut($name) {
                    Some(Store::$variant(store)) => Ok(store),
                    _ => Err(CacheError::StoreNotRegistered($name)),
                }
            }
        )*
    };
}

impl CommonStoresSwitch {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the store; a store with the same name is replaced in place.
    pub fn register(&mut self, store: Store) {
        let name = store.name();
        match self.index.get(name) {
            Some(&position) => self.stores[position] = store,
            None => {
                self.index.insert(name, self.stores.len());
                self.stores.push(store);
            }
        }
    }

    /// Applies `f` to every store in registration order, stopping at the first error.
    pub fn range<F>(&mut self, mut f: F) -> Result<(), CacheError>
    where
        F: FnMut(&mut dyn CommonStore) -> Result<(), CacheError>,
    {
        for store in self.stores.iter_mut() {
            f(store.as_common_store_mut())?;
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Store> {
        self.index.get(name).map(|&position| &self.stores[position])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Store> {
        self.index
            .get(name)
            .map(|&position| &mut self.stores[position])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stores.iter().map(|store| store.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Refreshes every store of `target` which has a counterpart here. Stores registered only in
    /// `target` are left alone.
    pub fn update_snapshot(&self, target: &mut CommonStoresSwitch) -> Result<(), CacheError> {
        for store in self.stores.iter() {
            if let Some(target_store) = target.find_mut(store.name()) {
                store.update_snapshot(target_store)?;
            }
        }
        Ok(())
    }

    typed_store_accessors! {
        node_store, node_store_mut, Node, NodeStore, NODE_STORE_NAME;
        pdb_store, pdb_store_mut, Pdb, PdbStore, PDB_STORE_NAME;
        pod_group_store, pod_group_store_mut, PodGroup, PodGroupStore, POD_GROUP_STORE_NAME;
        preemption_store, preemption_store_mut, Preemption, PreemptionStore, PREEMPTION_STORE_NAME;
    }
}

/// Builds the switch for the given mode. The node store is always present, the optional stores
/// follow the handler's switch type. Registration order: node, pdb, pod group, preemption.
pub fn make_store_switch(handler: &CacheHandler, mode: StoreMode) -> CommonStoresSwitch {
    let switch_type = handler.switch_type();
    let mut switch = CommonStoresSwitch::new();

    switch.register(Store::Node(NodeStore::new(handler.clone(), mode)));
    if switch_type.enabled(OptionalStore::Pdb) {
        switch.register(Store::Pdb(PdbStore::new(mode)));
    }
    if switch_type.enabled(OptionalStore::PodGroup) {
        switch.register(Store::PodGroup(PodGroupStore::new(mode)));
    }
    if switch_type.enabled(OptionalStore::Preemption) {
        switch.register(Store::Preemption(PreemptionStore::new(mode)));
    }
    switch
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::core::cache::commonstores::{
        make_store_switch, CommonStore, CommonStoresSwitch, Store, StoreMode, NODE_STORE_NAME,
        PDB_STORE_NAME, POD_GROUP_STORE_NAME, PREEMPTION_STORE_NAME,
    };
    use crate::core::cache::errors::CacheError;
    use crate::core::cache::handler::{CacheHandlerBuilder, OptionalStore, SwitchType};
    use crate::core::node::Node;

    #[test]
    fn test_registration_order() {
        let handler = CacheHandlerBuilder::new().build();
        let switch = make_store_switch(&handler, StoreMode::Cache);
        assert_eq!(
            vec![
                NODE_STORE_NAME,
                PDB_STORE_NAME,
                POD_GROUP_STORE_NAME,
                PREEMPTION_STORE_NAME
            ],
            switch.names()
        );
    }

    #[test]
    fn test_disabled_store_is_not_found() {
        let handler = CacheHandlerBuilder::new()
            .switch_type(SwitchType::DEFAULT.without(OptionalStore::PodGroup))
            .build();
        let switch = make_store_switch(&handler, StoreMode::Snapshot);

        assert!(switch.find(POD_GROUP_STORE_NAME).is_none());
        assert!(switch.find(PDB_STORE_NAME).is_some());
        assert_eq!(
            Some(CacheError::StoreNotRegistered(POD_GROUP_STORE_NAME)),
            switch.pod_group_store().err()
        );
        assert!(switch.preemption_store().is_ok());
    }

    #[test]
    fn test_range_stops_at_first_error() {
        let handler = CacheHandlerBuilder::new().build();
        let mut switch = make_store_switch(&handler, StoreMode::Cache);

        let visited = Arc::new(Mutex::new(Vec::new()));
        let result = switch.range(|store: &mut dyn CommonStore| {
            visited.lock().unwrap().push(store.name());
            if store.name() == PDB_STORE_NAME {
                return Err(CacheError::PdbNotFound("stop".to_string()));
            }
            Ok(())
        });

        assert_eq!(Err(CacheError::PdbNotFound("stop".to_string())), result);
        assert_eq!(vec![NODE_STORE_NAME, PDB_STORE_NAME], *visited.lock().unwrap());
    }

    #[test]
    fn test_range_delivers_node_events() {
        let handler = CacheHandlerBuilder::new().build();
        let mut switch = make_store_switch(&handler, StoreMode::Cache);
        let node = Arc::new(Node::new("node1", 4000, 1 << 34));

        switch.range(|store| store.add_node(&node)).unwrap();
        assert!(switch.node_store().unwrap().get("node1").is_some());
    }

    #[test]
    fn test_register_replaces_store_with_same_name() {
        let handler = CacheHandlerBuilder::new()
            .switch_type(SwitchType::NODE_ONLY)
            .build();
        let mut switch = make_store_switch(&handler, StoreMode::Cache);
        let node = Arc::new(Node::new("node1", 4000, 1 << 34));
        switch.range(|store| store.add_node(&node)).unwrap();

        let fresh = make_store_switch(&handler, StoreMode::Cache);
        let mut fresh_stores = fresh.stores;
        switch.register(fresh_stores.remove(0));

        assert_eq!(1, switch.len());
        assert_eq!(0, switch.node_store().unwrap().len());
    }

    #[test]
    fn test_update_snapshot_rejects_mismatched_stores() {
        let handler = CacheHandlerBuilder::new().build();
        let cache = make_store_switch(&handler, StoreMode::Cache);
        let mut snapshot = make_store_switch(&handler, StoreMode::Snapshot);

        let node_store = cache.find(NODE_STORE_NAME).unwrap();
        let pdb_store = snapshot.find_mut(PDB_STORE_NAME).unwrap();
        assert_eq!(
            Err(CacheError::StoreMismatch {
                source_store: NODE_STORE_NAME,
                target: PDB_STORE_NAME,
            }),
            node_store.update_snapshot(pdb_store)
        );

        let mut empty = CommonStoresSwitch::new();
        assert!(cache.update_snapshot(&mut empty).is_ok());
        assert!(matches!(snapshot.find(NODE_STORE_NAME), Some(Store::Node(_))));
    }
}
