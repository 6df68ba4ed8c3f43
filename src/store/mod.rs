/*!
# Store
The document-store boundary of the engine.
Everything the query and ingestion paths need from persistence goes through [`VariantStore`];
[`memory::InMemoryStore`] is the reference implementation used by the CLI and the tests.
*/

/// Reference in-memory store with JSON snapshots
pub mod memory;

use std::collections::BTreeMap;

use crate::data_types::dataset::{Dataset, DatasetRollup};
use crate::data_types::predicate::MatchPredicate;
use crate::data_types::variants::{DatasetEntry, StoredVariant, VariantHit};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store is unavailable: {0}")]
    Unavailable(String),
    #[error("write failed for {id}: {reason}")]
    WriteFailed { id: String, reason: String },
    #[error("variant {0} already exists")]
    DuplicateVariant(String),
    #[error("variant {0} was not found")]
    VariantNotFound(String),
    #[error("dataset {0} already exists")]
    DuplicateDataset(String),
    #[error("dataset {0} was not found")]
    DatasetNotFound(String),
}

impl StoreError {
    /// Only an unavailable store stops an ingestion batch; everything else is record-local
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Persistence operations consumed by the engine.
/// Implementations must be safe to share across threads; per-key serialization is handled by the caller.
pub trait VariantStore: Send + Sync {
    /// Full variant by content address
    fn get_variant(&self, id: &str) -> Result<Option<StoredVariant>, StoreError>;

    /// Inserts a brand new variant
    /// # Errors
    /// * `DuplicateVariant` if the id is already stored
    fn insert_variant(&self, variant: StoredVariant) -> Result<(), StoreError>;

    /// Replaces `{datasetEntries, totalCallCount}` of an existing variant as a single update
    /// # Errors
    /// * `VariantNotFound` if the id is not stored
    fn update_variant_calls(
        &self, id: &str, dataset_entries: BTreeMap<String, DatasetEntry>, total_call_count: u64
    ) -> Result<(), StoreError>;

    /// Removes a variant entirely
    fn delete_variant(&self, id: &str) -> Result<(), StoreError>;

    /// Partial variants matching the predicate, in no particular order
    fn query_variants(&self, predicate: &MatchPredicate) -> Result<Vec<VariantHit>, StoreError>;

    /// Every variant carrying an entry for the dataset
    fn variants_in_dataset(&self, dataset_id: &str) -> Result<Vec<StoredVariant>, StoreError>;

    fn list_datasets(&self) -> Result<Vec<Dataset>, StoreError>;

    fn get_dataset(&self, id: &str) -> Result<Option<Dataset>, StoreError>;

    /// # Errors
    /// * `DuplicateDataset` if the id is already used
    fn insert_dataset(&self, dataset: Dataset) -> Result<(), StoreError>;

    /// Replaces the rollup counters of a dataset
    /// # Errors
    /// * `DatasetNotFound` if the id is not stored
    fn update_dataset_rollup(&self, id: &str, rollup: DatasetRollup) -> Result<(), StoreError>;

    /// Datasets keyed by id, which is how the query path consumes them
    fn datasets_by_id(&self) -> Result<BTreeMap<String, Dataset>, StoreError> {
        Ok(self.list_datasets()?
            .into_iter()
            .map(|d| (d.id().to_string(), d))
            .collect())
    }
}
