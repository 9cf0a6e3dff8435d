//! Disruption budgets and the workload owners they cover.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use log::debug;

use crate::core::cache::commonstores::{CommonStore, StoreMode, PDB_STORE_NAME};
use crate::core::cache::errors::CacheError;
use crate::core::policy::{Owner, OwnerType, PodDisruptionBudget};

#[derive(Debug, Clone)]
pub struct PdbItem {
    pub pdb: Arc<PodDisruptionBudget>,
}

impl PdbItem {
    pub fn key(&self) -> String {
        self.pdb.key()
    }

    fn covers(&self, namespace: &str, labels: &BTreeMap<String, String>) -> bool {
        self.pdb.metadata.namespace == namespace && self.pdb.spec.selector.matches(labels)
    }
}

#[derive(Debug, Clone, Default)]
struct OwnerItem {
    namespace: String,
    labels: BTreeMap<String, String>,
    pdbs: BTreeSet<String>,
    // Matched pdbs changed because of a pdb event since the owner was last added or updated.
    pdbs_updated: bool,
}

#[derive(Debug, Clone)]
pub struct PdbStore {
    mode: StoreMode,
    pdbs: BTreeMap<String, PdbItem>,
    owners: HashMap<OwnerType, HashMap<String, OwnerItem>>,
    generation: u64,
}

impl PdbStore {
    pub fn new(mode: StoreMode) -> Self {
        Self {
            mode,
            pdbs: BTreeMap::new(),
            owners: HashMap::new(),
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

    fn matching_pdbs(&self, namespace: &str, labels: &BTreeMap<String, String>) -> BTreeSet<String> {
        self.pdbs
            .iter()
            .filter(|(_, item)| item.covers(namespace, labels))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Re-matches every owner of the namespace after a pdb change.
    fn rematch_owners(&mut self, namespace: &str) {
        let pdbs = &self.pdbs;
        for owners in self.owners.values_mut() {
            for item in owners.values_mut().filter(|item| item.namespace == namespace) {
                let matched: BTreeSet<String> = pdbs
                    .iter()
                    .filter(|(_, pdb)| pdb.covers(&item.namespace, &item.labels))
                    .map(|(key, _)| key.clone())
                    .collect();
                if matched != item.pdbs {
                    item.pdbs = matched;
                    item.pdbs_updated = true;
                }
            }
        }
    }

    pub fn add_pdb(&mut self, pdb: &Arc<PodDisruptionBudget>) -> Result<(), CacheError> {
        let key = pdb.key();
        debug!("{} sets pdb {:?}", PDB_STORE_NAME, key);
        let previous = self.pdbs.insert(key, PdbItem { pdb: pdb.clone() });
        if let Some(previous) = previous {
            if previous.pdb.metadata.namespace != pdb.metadata.namespace {
                self.rematch_owners(&previous.pdb.metadata.namespace);
            }
        }
        self.rematch_owners(&pdb.metadata.namespace);
        self.bump();
        Ok(())
    }

    pub fn update_pdb(
        &mut self,
        old_pdb: &Arc<PodDisruptionBudget>,
        new_pdb: &Arc<PodDisruptionBudget>,
    ) -> Result<(), CacheError> {
        if old_pdb.key() != new_pdb.key() {
            self.pdbs.remove(&old_pdb.key());
            self.rematch_owners(&old_pdb.metadata.namespace);
        }
        self.add_pdb(new_pdb)
    }

    pub fn delete_pdb(&mut self, pdb: &PodDisruptionBudget) -> Result<(), CacheError> {
        let key = pdb.key();
        let item = self
            .pdbs
            .remove(&key)
            .ok_or_else(|| CacheError::PdbNotFound(key.clone()))?;
        debug!("{} deletes pdb {:?}", PDB_STORE_NAME, key);
        self.rematch_owners(&item.pdb.metadata.namespace);
        self.bump();
        Ok(())
    }

    pub fn add_owner(&mut self, owner: &Owner) -> Result<(), CacheError> {
        let key = owner.key();
        let pdbs = self.matching_pdbs(&owner.metadata.namespace, &owner.labels);
        debug!(
            "{} sets {} {:?} covered by {} pdbs",
            PDB_STORE_NAME,
            owner.owner_type,
            key,
            pdbs.len()
        );
        self.owners.entry(owner.owner_type).or_default().insert(
            key,
            OwnerItem {
                namespace: owner.metadata.namespace.clone(),
                labels: owner.labels.clone(),
                pdbs,
                pdbs_updated: false,
            },
        );
        self.bump();
        Ok(())
    }

    pub fn update_owner(&mut self, old_owner: &Owner, new_owner: &Owner) -> Result<(), CacheError> {
        if old_owner.owner_type != new_owner.owner_type || old_owner.key() != new_owner.key() {
            self.delete_owner(old_owner)?;
        }
        self.add_owner(new_owner)
    }

    pub fn delete_owner(&mut self, owner: &Owner) -> Result<(), CacheError> {
        let key = owner.key();
        let removed = self
            .owners
            .get_mut(&owner.owner_type)
            .and_then(|owners| owners.remove(&key));
        if removed.is_none() {
            return Err(CacheError::OwnerNotFound(key));
        }
        self.bump();
        Ok(())
    }

    pub fn get_pdb_item_list(&self) -> Vec<PdbItem> {
        self.pdbs.values().cloned().collect()
    }

    /// Returns whether the owner is known, whether its pdbs changed since it was last set and
    /// the keys of the pdbs covering it.
    pub fn get_pdbs_for_owner(&self, owner_type: OwnerType, owner_key: &str) -> (bool, bool, Vec<String>) {
        match self
            .owners
            .get(&owner_type)
            .and_then(|owners| owners.get(owner_key))
        {
            Some(item) => (true, item.pdbs_updated, item.pdbs.iter().cloned().collect()),
            None => (false, false, Vec::new()),
        }
    }

    pub fn get_owner_labels(&self, owner_type: OwnerType, owner_key: &str) -> BTreeMap<String, String> {
        self.owners
            .get(&owner_type)
            .and_then(|owners| owners.get(owner_key))
            .map(|item| item.labels.clone())
            .unwrap_or_default()
    }

    pub fn get_owners_for_pdb(&self, pdb_key: &str, owner_type: OwnerType) -> Vec<String> {
        let mut owners: Vec<String> = self
            .owners
            .get(&owner_type)
            .map(|owners| {
                owners
                    .iter()
                    .filter(|(_, item)| item.pdbs.contains(pdb_key))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        owners.sort();
        owners
    }

    pub fn update_snapshot(&self, target: &mut PdbStore) {
        if self.generation != target.generation {
            *target = PdbStore {
                mode: target.mode,
                ..self.clone()
            };
        }
    }
}

impl CommonStore for PdbStore {
    fn name(&self) -> &'static str {
        PDB_STORE_NAME
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::core::cache::commonstores::pdb_store::PdbStore;
    use crate::core::cache::commonstores::StoreMode;
    use crate::core::cache::errors::CacheError;
    use crate::core::policy::OwnerType;
    use crate::test_util::helpers::{make_owner, make_pdb};

    #[test]
    fn test_owner_matching_by_namespace_and_selector() {
        let mut store = PdbStore::new(StoreMode::Cache);
        store
            .add_owner(&make_owner(OwnerType::ReplicaSet, "default", "web", &[("app", "web")]))
            .unwrap();
        store
            .add_owner(&make_owner(OwnerType::ReplicaSet, "other", "web", &[("app", "web")]))
            .unwrap();
        store
            .add_pdb(&Arc::new(make_pdb("default", "web-pdb", &[("app", "web")])))
            .unwrap();

        let (exists, updated, pdbs) = store.get_pdbs_for_owner(OwnerType::ReplicaSet, "default/web");
        assert!(exists);
        assert!(updated);
        assert_eq!(vec!["default/web-pdb".to_string()], pdbs);

        let (exists, updated, pdbs) = store.get_pdbs_for_owner(OwnerType::ReplicaSet, "other/web");
        assert!(exists);
        assert!(!updated);
        assert!(pdbs.is_empty());

        assert_eq!(
            (false, false, Vec::<String>::new()),
            store.get_pdbs_for_owner(OwnerType::DaemonSet, "default/web")
        );
        assert_eq!(
            vec!["default/web".to_string()],
            store.get_owners_for_pdb("default/web-pdb", OwnerType::ReplicaSet)
        );
    }

    #[test]
    fn test_owner_update_resets_updated_flag() {
        let mut store = PdbStore::new(StoreMode::Cache);
        let owner = make_owner(OwnerType::StatefulSet, "default", "db", &[("app", "db")]);
        store.add_owner(&owner).unwrap();
        store
            .add_pdb(&Arc::new(make_pdb("default", "all", &[])))
            .unwrap();
        assert!(store.get_pdbs_for_owner(OwnerType::StatefulSet, "default/db").1);

        store.update_owner(&owner, &owner).unwrap();
        let (_, updated, pdbs) = store.get_pdbs_for_owner(OwnerType::StatefulSet, "default/db");
        assert!(!updated);
        assert_eq!(vec!["default/all".to_string()], pdbs);
    }

    #[test]
    fn test_delete_pdb_and_owner() {
        let mut store = PdbStore::new(StoreMode::Cache);
        let owner = make_owner(OwnerType::ReplicaSet, "default", "web", &[("app", "web")]);
        let pdb = make_pdb("default", "web-pdb", &[("app", "web")]);
        store.add_owner(&owner).unwrap();
        store.add_pdb(&Arc::new(pdb.clone())).unwrap();

        store.delete_pdb(&pdb).unwrap();
        assert!(store.get_pdb_item_list().is_empty());
        assert!(store
            .get_owners_for_pdb("default/web-pdb", OwnerType::ReplicaSet)
            .is_empty());
        assert_eq!(
            Err(CacheError::PdbNotFound("default/web-pdb".to_string())),
            store.delete_pdb(&pdb)
        );

        assert_eq!(
            BTreeMap::from([("app".to_string(), "web".to_string())]),
            store.get_owner_labels(OwnerType::ReplicaSet, "default/web")
        );
        store.delete_owner(&owner).unwrap();
        assert!(store
            .get_owner_labels(OwnerType::ReplicaSet, "default/web")
            .is_empty());
        assert_eq!(
            Err(CacheError::OwnerNotFound("default/web".to_string())),
            store.delete_owner(&owner)
        );
    }

    #[test]
    fn test_update_snapshot_copies_on_generation_change() {
        let mut cache = PdbStore::new(StoreMode::Cache);
        let mut snapshot = PdbStore::new(StoreMode::Snapshot);
        cache
            .add_pdb(&Arc::new(make_pdb("default", "web-pdb", &[])))
            .unwrap();

        cache.update_snapshot(&mut snapshot);
        assert_eq!(1, snapshot.get_pdb_item_list().len());
        assert_eq!(cache.generation(), snapshot.generation());
    }
}
