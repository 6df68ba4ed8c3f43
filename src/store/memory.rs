use anyhow::ensure;
use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::data_types::dataset::{Dataset, DatasetRollup};
use crate::data_types::predicate::MatchPredicate;
use crate::data_types::variants::{DatasetEntry, StoredVariant, VariantHit};
use crate::store::{StoreError, VariantStore};
use crate::util::json_io::{load_json, save_json};

/// On-disk layout of a store snapshot
#[derive(Debug, Default, Deserialize, Serialize)]
struct StoreSnapshot {
    datasets: Vec<Dataset>,
    variants: Vec<StoredVariant>,
}

/// Reference store holding everything in memory.
/// Predicate queries are a full scan; exact-id queries hit the id table directly.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    variants: RwLock<FxHashMap<String, StoredVariant>>,
    datasets: RwLock<BTreeMap<String, Dataset>>,
}

impl InMemoryStore {
    /// Restores a store from a snapshot file
    /// # Arguments
    /// * `filename` - JSON snapshot, optionally gzipped
    /// # Errors
    /// * if the file cannot be loaded
    /// * if a variant id does not match its identity fields, or its call counts disagree
    /// * if a variant references an unknown dataset
    pub fn load(filename: &Path) -> anyhow::Result<Self> {
        let snapshot: StoreSnapshot = load_json(filename)?;

        let datasets: BTreeMap<String, Dataset> = snapshot.datasets.into_iter()
            .map(|d| (d.id().to_string(), d))
            .collect();
        let mut variants: FxHashMap<String, StoredVariant> = Default::default();
        for variant in snapshot.variants.into_iter() {
            ensure!(
                variant.id() == variant.identity().id(),
                "Variant {} in {filename:?} does not match its identity fields", variant.id()
            );
            ensure!(
                variant.total_call_count == variant.summed_allele_count(),
                "Variant {} in {filename:?} has totalCallCount {} but its entries sum to {}",
                variant.id(), variant.total_call_count, variant.summed_allele_count()
            );
            for dataset_id in variant.dataset_entries.keys() {
                ensure!(
                    datasets.contains_key(dataset_id),
                    "Variant {} in {filename:?} references unknown dataset {dataset_id:?}", variant.id()
                );
            }
            variants.insert(variant.id().to_string(), variant);
        }

        info!("Loaded {} datasets and {} variants from {filename:?}", datasets.len(), variants.len());
        Ok(Self {
            variants: RwLock::new(variants),
            datasets: RwLock::new(datasets),
        })
    }

    /// Loads the snapshot if it exists, otherwise starts empty
    pub fn open_or_create(filename: &Path) -> anyhow::Result<Self> {
        if filename.exists() {
            Self::load(filename)
        } else {
            info!("No database at {filename:?}, starting empty");
            Ok(Self::default())
        }
    }

    /// Writes a snapshot, variants sorted by id so repeated saves are stable
    /// # Errors
    /// * if either table is poisoned
    /// * if the file cannot be written
    pub fn save(&self, filename: &Path) -> anyhow::Result<()> {
        let snapshot = {
            let variants = self.read_variants()?;
            let datasets = self.read_datasets()?;
            let mut variants: Vec<StoredVariant> = variants.values().cloned().collect();
            variants.sort_by(|a, b| a.id().cmp(b.id()));
            StoreSnapshot {
                datasets: datasets.values().cloned().collect(),
                variants
            }
        };
        save_json(&snapshot, filename)?;
        debug!("Saved {} variants to {filename:?}", snapshot.variants.len());
        Ok(())
    }

    /// Number of stored variants
    pub fn variant_count(&self) -> Result<usize, StoreError> {
        Ok(self.read_variants()?.len())
    }

    fn read_variants(&self) -> Result<RwLockReadGuard<'_, FxHashMap<String, StoredVariant>>, StoreError> {
        self.variants.read().map_err(|_| StoreError::Unavailable("variant table lock is poisoned".to_string()))
    }

    fn write_variants(&self) -> Result<RwLockWriteGuard<'_, FxHashMap<String, StoredVariant>>, StoreError> {
        self.variants.write().map_err(|_| StoreError::Unavailable("variant table lock is poisoned".to_string()))
    }

    fn read_datasets(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Dataset>>, StoreError> {
        self.datasets.read().map_err(|_| StoreError::Unavailable("dataset table lock is poisoned".to_string()))
    }

    fn write_datasets(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Dataset>>, StoreError> {
        self.datasets.write().map_err(|_| StoreError::Unavailable("dataset table lock is poisoned".to_string()))
    }
}

impl VariantStore for InMemoryStore {
    fn get_variant(&self, id: &str) -> Result<Option<StoredVariant>, StoreError> {
        Ok(self.read_variants()?.get(id).cloned())
    }

    fn insert_variant(&self, variant: StoredVariant) -> Result<(), StoreError> {
        let mut variants = self.write_variants()?;
        if variants.contains_key(variant.id()) {
            return Err(StoreError::DuplicateVariant(variant.id().to_string()));
        }
        variants.insert(variant.id().to_string(), variant);
        Ok(())
    }

    fn update_variant_calls(
        &self, id: &str, dataset_entries: BTreeMap<String, DatasetEntry>, total_call_count: u64
    ) -> Result<(), StoreError> {
        let mut variants = self.write_variants()?;
        let variant = variants.get_mut(id)
            .ok_or_else(|| StoreError::VariantNotFound(id.to_string()))?;
        variant.dataset_entries = dataset_entries;
        variant.total_call_count = total_call_count;
        Ok(())
    }

    fn delete_variant(&self, id: &str) -> Result<(), StoreError> {
        match self.write_variants()?.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::VariantNotFound(id.to_string()))
        }
    }

    fn query_variants(&self, predicate: &MatchPredicate) -> Result<Vec<VariantHit>, StoreError> {
        let variants = self.read_variants()?;
        let hits = match predicate.exact_id() {
            Some(id) => variants.get(id).map(|v| v.to_hit()).into_iter().collect(),
            None => variants.values()
                .filter(|v| predicate.matches(v))
                .map(|v| v.to_hit())
                .collect()
        };
        Ok(hits)
    }

    fn variants_in_dataset(&self, dataset_id: &str) -> Result<Vec<StoredVariant>, StoreError> {
        Ok(self.read_variants()?.values()
            .filter(|v| v.dataset_entries.contains_key(dataset_id))
            .cloned()
            .collect())
    }

    fn list_datasets(&self) -> Result<Vec<Dataset>, StoreError> {
        Ok(self.read_datasets()?.values().cloned().collect())
    }

    fn get_dataset(&self, id: &str) -> Result<Option<Dataset>, StoreError> {
        Ok(self.read_datasets()?.get(id).cloned())
    }

    fn insert_dataset(&self, dataset: Dataset) -> Result<(), StoreError> {
        let mut datasets = self.write_datasets()?;
        if datasets.contains_key(dataset.id()) {
            return Err(StoreError::DuplicateDataset(dataset.id().to_string()));
        }
        datasets.insert(dataset.id().to_string(), dataset);
        Ok(())
    }

    fn update_dataset_rollup(&self, id: &str, rollup: DatasetRollup) -> Result<(), StoreError> {
        let mut datasets = self.write_datasets()?;
        let dataset = datasets.get_mut(id)
            .ok_or_else(|| StoreError::DatasetNotFound(id.to_string()))?;
        dataset.set_rollup(rollup);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::dataset::AccessLevel;
    use crate::data_types::predicate::{AltMatcher, PositionBounds};
    use crate::data_types::variants::RawVariantRecord;

    fn variant(start: u64, alt: &str) -> StoredVariant {
        let record = RawVariantRecord {
            chromosome: "1".to_string(),
            start,
            end: Some(start + 1),
            reference_bases: "A".to_string(),
            alternate_bases: alt.to_string(),
            ..Default::default()
        };
        let calls = [("s1".to_string(), 1)].into_iter().collect();
        StoredVariant::from_record(&record, "GRCh37", "ds1", calls).unwrap()
    }

    fn populated() -> InMemoryStore {
        let store = InMemoryStore::default();
        store.insert_dataset(Dataset::new("ds1", "one", Some("GRCh37"), AccessLevel::Public)).unwrap();
        store.insert_variant(variant(100, "T")).unwrap();
        store.insert_variant(variant(200, "G")).unwrap();
        store
    }

    #[test]
    fn test_insert_get_update() {
        let store = populated();
        let v = variant(100, "T");
        assert_eq!(store.insert_variant(v.clone()), Err(StoreError::DuplicateVariant(v.id().to_string())));

        let mut entries = v.dataset_entries.clone();
        entries.insert("ds2".to_string(), DatasetEntry::from_calls([("s9".to_string(), 2)].into_iter().collect()));
        store.update_variant_calls(v.id(), entries, 3).unwrap();
        let stored = store.get_variant(v.id()).unwrap().unwrap();
        assert_eq!(stored.total_call_count, 3);
        assert_eq!(stored.dataset_entries.len(), 2);

        assert_eq!(
            store.update_variant_calls("missing", BTreeMap::new(), 0),
            Err(StoreError::VariantNotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_query_variants() {
        let store = populated();
        let exact = MatchPredicate::ExactId { id: variant(200, "G").id().to_string() };
        assert_eq!(store.query_variants(&exact).unwrap().len(), 1);

        let range = MatchPredicate::Structural {
            assembly_id: "GRCh37".to_string(),
            reference_name: "1".to_string(),
            reference_bases: "A".to_string(),
            alternate: Some(AltMatcher::from_bases("N".to_string())),
            variant_type: None,
            mate_name: None,
            position: PositionBounds::Range { start_min: Some(50), start_max: Some(250), end_min: None, end_max: None }
        };
        assert_eq!(store.query_variants(&range).unwrap().len(), 2);
        assert_eq!(store.variants_in_dataset("ds1").unwrap().len(), 2);
        assert!(store.variants_in_dataset("ds2").unwrap().is_empty());
    }

    #[test]
    fn test_datasets() {
        let store = populated();
        assert!(matches!(
            store.insert_dataset(Dataset::new("ds1", "dup", None, AccessLevel::Public)),
            Err(StoreError::DuplicateDataset(_))
        ));
        store.update_dataset_rollup("ds1", DatasetRollup { variant_count: 2, ..Default::default() }).unwrap();
        assert_eq!(store.get_dataset("ds1").unwrap().unwrap().variant_count(), 2);
        assert_eq!(
            store.update_dataset_rollup("nope", DatasetRollup::default()),
            Err(StoreError::DatasetNotFound("nope".to_string()))
        );
        assert_eq!(store.datasets_by_id().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let store = populated();
        for name in ["db.json", "db.json.gz"] {
            let path = tmp_dir.path().join(name);
            store.save(&path).unwrap();
            let restored = InMemoryStore::load(&path).unwrap();
            assert_eq!(restored.variant_count().unwrap(), 2);
            assert_eq!(restored.list_datasets().unwrap(), store.list_datasets().unwrap());
            let id = variant(100, "T").id().to_string();
            assert_eq!(restored.get_variant(&id).unwrap(), store.get_variant(&id).unwrap());
        }

        let fresh = InMemoryStore::open_or_create(&tmp_dir.path().join("absent.json")).unwrap();
        assert_eq!(fresh.variant_count().unwrap(), 0);
    }

    #[test]
    fn test_snapshot_rejects_orphans() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::default();
        store.insert_variant(variant(100, "T")).unwrap();
        let path = tmp_dir.path().join("db.json");
        store.save(&path).unwrap();
        assert!(InMemoryStore::load(&path).is_err());
    }
}
