use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;

use crate::core::cache::commonstores::{CommonStore, StoreMode, PREEMPTION_STORE_NAME};
use crate::core::cache::errors::CacheError;
use crate::core::node::Node;
use crate::core::pod::{CachePodInfo, Pod};

/// Which assumed preemptors displaced which victims, per node.
#[derive(Debug, Clone)]
pub struct PreemptionStore {
    mode: StoreMode,
    // Node name -> victim key -> preemptor keys
    victims: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    generation: u64,
}

impl PreemptionStore {
    pub fn new(mode: StoreMode) -> Self {
        Self {
            mode,
            victims: BTreeMap::new(),
            generation: mode.initial_generation(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump(&mut self) {
        self.generation = match self.mode {
            StoreMode::Cache => self.generation + 1,
            StoreMode::Snapshot => 0,
        };
    }

    pub fn get_preemptors_by_victim(&self, node_name: &str, victim_key: &str) -> Vec<String> {
        self.victims
            .get(node_name)
            .and_then(|victims| victims.get(victim_key))
            .map(|preemptors| preemptors.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn update_snapshot(&self, target: &mut PreemptionStore) {
        if self.generation != target.generation {
            target.victims = self.victims.clone();
            target.generation = self.generation;
        }
    }
}

fn victim_node<'a>(victim: &'a Pod, preemptor_node: &'a str) -> &'a str {
    victim.node_name().unwrap_or(preemptor_node)
}

impl CommonStore for PreemptionStore {
    fn name(&self) -> &'static str {
        PREEMPTION_STORE_NAME
    }

    fn remove_pod(&mut self, pod: &Arc<Pod>) -> Result<(), CacheError> {
        let key = pod.key();
        let mut changed = false;
        for victims in self.victims.values_mut() {
            changed |= victims.remove(&key).is_some();
            for preemptors in victims.values_mut() {
                changed |= preemptors.remove(&key);
            }
            victims.retain(|_, preemptors| !preemptors.is_empty());
        }
        if changed {
            self.victims.retain(|_, victims| !victims.is_empty());
            self.bump();
        }
        Ok(())
    }

    fn remove_node(&mut self, node: &Arc<Node>) -> Result<(), CacheError> {
        if self.victims.remove(node.name()).is_some() {
            self.bump();
        }
        Ok(())
    }

    fn assume_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        if pod_info.victims.is_empty() {
            return Ok(());
        }
        let preemptor = pod_info.pod.key();
        let node_name = pod_info.pod.node_name().unwrap_or_default();
        for victim in pod_info.victims.iter() {
            debug!(
                "{} records {:?} preempting {:?}",
                PREEMPTION_STORE_NAME,
                preemptor,
                victim.key()
            );
            self.victims
                .entry(victim_node(victim, node_name).to_string())
                .or_default()
                .entry(victim.key())
                .or_default()
                .insert(preemptor.clone());
        }
        self.bump();
        Ok(())
    }

    fn forget_pod(&mut self, pod_info: &CachePodInfo) -> Result<(), CacheError> {
        if pod_info.victims.is_empty() {
            return Ok(());
        }
        let preemptor = pod_info.pod.key();
        let node_name = pod_info.pod.node_name().unwrap_or_default();
        for victim in pod_info.victims.iter() {
            let node = victim_node(victim, node_name);
            let Some(victims) = self.victims.get_mut(node) else {
                continue;
            };
            let victim_key = victim.key();
            if let Some(preemptors) = victims.get_mut(&victim_key) {
                preemptors.remove(&preemptor);
                if preemptors.is_empty() {
                    victims.remove(&victim_key);
                }
            }
            if victims.is_empty() {
                self.victims.remove(node);
            }
        }
        self.bump();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::cache::commonstores::preemption_store::PreemptionStore;
    use crate::core::cache::commonstores::{CommonStore, StoreMode};
    use crate::core::node::Node;
    use crate::core::pod::{CachePodInfo, PodResourceType};
    use crate::test_util::helpers::{assigned, make_pod};

    fn preemption(preemptor: &str, victims: &[&str]) -> CachePodInfo {
        CachePodInfo::with_victims(
            assigned(make_pod(preemptor, 100, 100, PodResourceType::Guaranteed), "node1"),
            victims
                .iter()
                .map(|name| assigned(make_pod(name, 100, 100, PodResourceType::BestEffort), "node1"))
                .collect(),
        )
    }

    #[test]
    fn test_assume_and_forget_record_preemptors() {
        let mut store = PreemptionStore::new(StoreMode::Cache);
        let first = preemption("p1", &["v1", "v2"]);
        let second = preemption("p2", &["v1"]);
        store.assume_pod(&first).unwrap();
        store.assume_pod(&second).unwrap();

        assert_eq!(
            vec!["default/p1".to_string(), "default/p2".to_string()],
            store.get_preemptors_by_victim("node1", "default/v1")
        );

        store.forget_pod(&first).unwrap();
        assert_eq!(
            vec!["default/p2".to_string()],
            store.get_preemptors_by_victim("node1", "default/v1")
        );
        assert!(store
            .get_preemptors_by_victim("node1", "default/v2")
            .is_empty());
    }

    #[test]
    fn test_removals_drop_records() {
        let mut store = PreemptionStore::new(StoreMode::Cache);
        let pod_info = preemption("p1", &["v1", "v2"]);
        store.assume_pod(&pod_info).unwrap();

        store.remove_pod(&pod_info.victims[0]).unwrap();
        assert!(store
            .get_preemptors_by_victim("node1", "default/v1")
            .is_empty());
        assert_eq!(1, store.get_preemptors_by_victim("node1", "default/v2").len());

        store
            .remove_node(&Arc::new(Node::new("node1", 1000, 1000)))
            .unwrap();
        assert!(store
            .get_preemptors_by_victim("node1", "default/v2")
            .is_empty());
    }

    #[test]
    fn test_removed_preemptor_drops_records() {
        let mut store = PreemptionStore::new(StoreMode::Cache);
        let first = preemption("p1", &["v1", "v2"]);
        let second = preemption("p2", &["v1"]);
        store.assume_pod(&first).unwrap();
        store.assume_pod(&second).unwrap();

        store.remove_pod(&first.pod).unwrap();
        assert_eq!(
            vec!["default/p2".to_string()],
            store.get_preemptors_by_victim("node1", "default/v1")
        );
        assert!(store
            .get_preemptors_by_victim("node1", "default/v2")
            .is_empty());
    }
}
