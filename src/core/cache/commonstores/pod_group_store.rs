use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::core::cache::commonstores::{CommonStore, StoreMode, POD_GROUP_STORE_NAME};
use crate::core::cache::errors::CacheError;
use crate::core::policy::PodGroup;

/// Pod groups by `namespace/name`.
#[derive(Debug, Clone)]
pub struct PodGroupStore {
    mode: StoreMode,
    pod_groups: BTreeMap<String, Arc<PodGroup>>,
    generation: u64,
}

impl PodGroupStore {
    pub fn new(mode: StoreMode) -> Self {
        Self {
            mode,
            pod_groups: BTreeMap::new(),
            generation: mode.initial_generation(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.pod_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pod_groups.is_empty()
    }

    fn bump(&mut self) {
        self.generation = match self.mode {
            StoreMode::Cache => self.generation + 1,
            StoreMode::Snapshot => 0,
        };
    }

    pub fn add_pod_group(&mut self, pod_group: &Arc<PodGroup>) -> Result<(), CacheError> {
        debug!("{} sets pod group {:?}", POD_GROUP_STORE_NAME, pod_group.key());
        self.pod_groups.insert(pod_group.key(), pod_group.clone());
        self.bump();
        Ok(())
    }

    pub fn update_pod_group(
        &mut self,
        old_pod_group: &Arc<PodGroup>,
        new_pod_group: &Arc<PodGroup>,
    ) -> Result<(), CacheError> {
        if old_pod_group.key() != new_pod_group.key() {
            self.pod_groups.remove(&old_pod_group.key());
        }
        self.add_pod_group(new_pod_group)
    }

    pub fn delete_pod_group(&mut self, pod_group: &PodGroup) -> Result<(), CacheError> {
        let key = pod_group.key();
        self.pod_groups
            .remove(&key)
            .ok_or(CacheError::PodGroupNotFound(key))?;
        self.bump();
        Ok(())
    }

    pub fn get_pod_group_info(&self, key: &str) -> Result<Arc<PodGroup>, CacheError> {
        self.pod_groups
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::PodGroupNotFound(key.to_string()))
    }

    pub fn update_snapshot(&self, target: &mut PodGroupStore) {
        if self.generation != target.generation {
            target.pod_groups = self.pod_groups.clone();
            target.generation = self.generation;
        }
    }
}

impl CommonStore for PodGroupStore {
    fn name(&self) -> &'static str {
        POD_GROUP_STORE_NAME
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::cache::commonstores::pod_group_store::PodGroupStore;
    use crate::core::cache::commonstores::StoreMode;
    use crate::core::cache::errors::CacheError;
    use crate::test_util::helpers::make_pod_group;

    #[test]
    fn test_pod_group_lifecycle() {
        let mut store = PodGroupStore::new(StoreMode::Cache);
        let pod_group = Arc::new(make_pod_group("default", "training", 4));
        store.add_pod_group(&pod_group).unwrap();
        assert_eq!(4, store.get_pod_group_info("default/training").unwrap().spec.min_member);

        let mut bigger = (*pod_group).clone();
        bigger.spec.min_member = 8;
        store
            .update_pod_group(&pod_group, &Arc::new(bigger))
            .unwrap();
        assert_eq!(8, store.get_pod_group_info("default/training").unwrap().spec.min_member);

        store.delete_pod_group(&pod_group).unwrap();
        assert_eq!(
            Err(CacheError::PodGroupNotFound("default/training".to_string())),
            store.get_pod_group_info("default/training")
        );
        assert_eq!(
            Err(CacheError::PodGroupNotFound("default/training".to_string())),
            store.delete_pod_group(&pod_group)
        );
    }

    #[test]
    fn test_update_snapshot() {
        let mut cache = PodGroupStore::new(StoreMode::Cache);
        let mut snapshot = PodGroupStore::new(StoreMode::Snapshot);
        cache
            .add_pod_group(&Arc::new(make_pod_group("default", "pg", 2)))
            .unwrap();
        cache.update_snapshot(&mut snapshot);
        assert_eq!(1, snapshot.len());

        let pod_group = make_pod_group("default", "pg", 2);
        cache.delete_pod_group(&pod_group).unwrap();
        cache.update_snapshot(&mut snapshot);
        assert!(snapshot.is_empty());
    }
}
