use log::{debug, info};
use std::collections::BTreeSet;

use crate::data_types::dataset::DatasetRollup;
use crate::data_types::variants::StoredVariant;
use crate::store::{StoreError, VariantStore};
use crate::util::keyed_locks::EngineLocks;

/// Allele count as a grouped sum of `totalCallCount`.
/// Only meaningful when the dataset is the only one in the beacon, since the total spans all datasets.
pub fn grouped_allele_count(variants: &[StoredVariant]) -> u64 {
    variants.iter().map(|v| v.total_call_count).sum()
}

/// Allele count as a per-dataset, per-sample aggregate
pub fn per_sample_allele_count(variants: &[StoredVariant], dataset_id: &str) -> u64 {
    variants.iter()
        .filter_map(|v| v.dataset_entries.get(dataset_id))
        .flat_map(|entry| entry.samples.values())
        .sum()
}

/// Derives the rollup of a dataset from the variants carrying an entry for it.
/// # Arguments
/// * `variants` - every stored variant with an entry for `dataset_id`
/// * `dataset_id` - the dataset being rolled up
/// * `single_dataset_beacon` - true if this is the only dataset, which allows the grouped sum
pub fn compute_rollup(variants: &[StoredVariant], dataset_id: &str, single_dataset_beacon: bool) -> DatasetRollup {
    let mut sample_set: BTreeSet<String> = BTreeSet::new();
    let mut variant_count = 0;
    for entry in variants.iter().filter_map(|v| v.dataset_entries.get(dataset_id)) {
        variant_count += 1;
        sample_set.extend(entry.samples.keys().cloned());
    }

    let allele_count = if single_dataset_beacon {
        grouped_allele_count(variants)
    } else {
        per_sample_allele_count(variants, dataset_id)
    };

    DatasetRollup { sample_set, variant_count, allele_count }
}

/// Recomputes and stores the rollup of a dataset, serialized per dataset.
/// The result replaces whatever counters the dataset had before.
/// # Arguments
/// * `store` - the backing store
/// * `locks` - engine locks; the dataset lock is held for the whole read-compute-write
/// * `dataset_id` - the dataset to refresh
/// # Errors
/// * if the store fails to list variants or datasets, or to write the rollup
pub fn recompute_rollup<S: VariantStore + ?Sized>(
    store: &S, locks: &EngineLocks, dataset_id: &str
) -> Result<DatasetRollup, StoreError> {
    locks.datasets.with_lock(dataset_id, || {
        let variants = store.variants_in_dataset(dataset_id)?;
        let single_dataset_beacon = store.list_datasets()?.len() == 1;
        debug!("Rolling up {} variants for {dataset_id:?}, single dataset: {single_dataset_beacon}", variants.len());

        let rollup = compute_rollup(&variants, dataset_id, single_dataset_beacon);
        store.update_dataset_rollup(dataset_id, rollup.clone())?;
        info!(
            "Dataset {dataset_id:?} now has {} variants, {} alleles, {} samples",
            rollup.variant_count, rollup.allele_count, rollup.sample_set.len()
        );
        Ok(rollup)
    })
}
