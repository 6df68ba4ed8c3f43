/*!
# Merge engine
Merges parsed variant records into the store, one dataset at a time.

Every record goes through the same steps:
1. skip it if none of the samples of interest carry the ALT allele
2. skip it with a warning if its chromosome is not in the allow-list
3. derive the content address and take the per-variant lock
4. insert a new variant, or merge only the samples that the dataset entry does not already have

Re-ingesting the same sample for the same dataset never double-counts.
After the batch, the dataset rollup is recomputed from scratch under the per-dataset lock.
A failed write only loses that record, unless the store reports itself unavailable, which stops the batch.

## Example usage
```rust
use allele_beacon::data_types::dataset::{AccessLevel, Dataset};
use allele_beacon::data_types::variants::RawVariantRecord;
use allele_beacon::merge_engine::{ingest_records, IngestConfigBuilder};
use allele_beacon::store::VariantStore;
use allele_beacon::store::memory::InMemoryStore;
use allele_beacon::util::keyed_locks::EngineLocks;

let store = InMemoryStore::default();
store.insert_dataset(Dataset::new("ds1", "Dataset one", Some("GRCh37"), AccessLevel::Public)).unwrap();

let record = RawVariantRecord {
    chromosome: "chr1".to_string(),
    start: 100,
    end: Some(101),
    reference_bases: "A".to_string(),
    alternate_bases: "T".to_string(),
    genotype_calls: [("s1".to_string(), 1)].into_iter().collect(),
    ..Default::default()
};
let config = IngestConfigBuilder::default()
    .dataset_id("ds1".to_string())
    .samples(["s1".to_string()].into_iter().collect())
    .build().unwrap();

let locks = EngineLocks::default();
let summary = ingest_records(&store, &locks, &config, vec![record.clone()], None).unwrap();
assert_eq!(summary.inserted, 1);

// the second pass is a no-op
let summary = ingest_records(&store, &locks, &config, vec![record], None).unwrap();
assert_eq!(summary.inserted, 0);
assert_eq!(summary.unchanged, 1);
assert_eq!(store.get_dataset("ds1").unwrap().unwrap().allele_count(), 1);
```
*/

use derive_builder::Builder;
use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::data_types::ingest_summary::{DeleteSummary, IngestSummary};
use crate::data_types::variants::{DatasetEntry, RawVariantRecord, StoredVariant};
use crate::rollup::recompute_rollup;
use crate::store::{StoreError, VariantStore};
use crate::util::keyed_locks::EngineLocks;

/// Canonical chromosomes accepted by default: 1-22, X, Y, and MT
pub fn default_allowed_chromosomes() -> BTreeSet<String> {
    (1..=22).map(|c: u32| c.to_string())
        .chain(["X", "Y", "MT"].into_iter().map(String::from))
        .collect()
}

/// Controls a single ingestion batch
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct IngestConfig {
    /// The dataset receiving the calls; must already exist
    dataset_id: String,
    /// Genome build of the records; empty means "use the dataset's build"
    assembly_id: String,
    /// Samples of interest; calls from other samples in the source are ignored
    samples: BTreeSet<String>,
    /// Canonical chromosome names that may be ingested
    allowed_chromosomes: BTreeSet<String>,
    /// Number of records merged concurrently; 1 keeps everything on the calling thread
    threads: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset_id: String::new(),
            assembly_id: String::new(),
            samples: BTreeSet::new(),
            allowed_chromosomes: default_allowed_chromosomes(),
            threads: 1,
        }
    }
}

impl IngestConfig {
    // getters
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn assembly_id(&self) -> &str {
        &self.assembly_id
    }

    pub fn samples(&self) -> &BTreeSet<String> {
        &self.samples
    }

    pub fn allowed_chromosomes(&self) -> &BTreeSet<String> {
        &self.allowed_chromosomes
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("dataset {0:?} does not exist")]
    UnknownDataset(String),
    #[error("no samples were provided")]
    NoSamples,
    #[error("samples not found: {}", .0.join(", "))]
    UnknownSamples(Vec<String>),
    #[error("assembly {assembly_id:?} does not match dataset {dataset_id:?} built on {dataset_assembly:?}")]
    AssemblyMismatch { dataset_id: String, dataset_assembly: String, assembly_id: String },
    #[error("no assembly provided and dataset {0:?} does not define one")]
    MissingAssembly(String),
    #[error("store became unavailable mid-batch after {} records: {source}", .summary.records)]
    StoreUnavailable { source: StoreError, summary: IngestSummary },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to a single record
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RecordOutcome {
    Inserted,
    Merged,
    Unchanged,
    NotCalled,
    SkippedChromosome,
    Invalid,
    Failed,
}

fn tally(summary: &mut IngestSummary, outcome: RecordOutcome) {
    summary.records += 1;
    match outcome {
        RecordOutcome::Inserted => summary.inserted += 1,
        RecordOutcome::Merged => summary.merged += 1,
        RecordOutcome::Unchanged => summary.unchanged += 1,
        RecordOutcome::NotCalled => summary.not_called += 1,
        RecordOutcome::SkippedChromosome => summary.skipped_chromosome += 1,
        RecordOutcome::Invalid => summary.invalid += 1,
        RecordOutcome::Failed => summary.failed += 1,
    };
}

/// Verifies that every requested sample exists in the record source
/// # Arguments
/// * `requested` - samples the caller wants to ingest
/// * `available` - samples present in the source
/// # Errors
/// * `NoSamples` if nothing was requested
/// * `UnknownSamples` listing the requested samples that are missing
pub fn check_samples(requested: &BTreeSet<String>, available: &[String]) -> Result<(), IngestError> {
    if requested.is_empty() {
        return Err(IngestError::NoSamples);
    }
    let available: BTreeSet<&str> = available.iter().map(|s| s.as_str()).collect();
    let missing: Vec<String> = requested.iter()
        .filter(|s| !available.contains(s.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::UnknownSamples(missing))
    }
}

/// Merges incoming calls into an existing variant for one dataset.
/// Only samples absent from the existing dataset entry are added; a new dataset entry takes every call.
/// Returns the new `{datasetEntries, totalCallCount}`, or `None` if nothing would change.
/// # Arguments
/// * `existing` - the stored variant
/// * `dataset_id` - the dataset receiving the calls
/// * `calls` - non-zero calls per sample
pub fn merge_calls(
    existing: &StoredVariant, dataset_id: &str, calls: &BTreeMap<String, u64>
) -> Option<(BTreeMap<String, DatasetEntry>, u64)> {
    let mut entries = existing.dataset_entries.clone();
    let added = match entries.get_mut(dataset_id) {
        Some(entry) => {
            let mut added = 0;
            let mut new_samples = 0;
            for (sample, &count) in calls.iter() {
                if !entry.samples.contains_key(sample) {
                    entry.samples.insert(sample.clone(), count);
                    added += count;
                    new_samples += 1;
                }
            }
            if new_samples == 0 {
                return None;
            }
            entry.allele_count += added;
            added
        },
        None => {
            if calls.is_empty() {
                return None;
            }
            let entry = DatasetEntry::from_calls(calls.clone());
            let added = entry.allele_count;
            entries.insert(dataset_id.to_string(), entry);
            added
        }
    };
    Some((entries, existing.total_call_count + added))
}

/// Lookup-then-write for one variant; the caller holds the variant lock
fn upsert_variant<S: VariantStore + ?Sized>(
    store: &S, dataset_id: &str, incoming: StoredVariant, calls: &BTreeMap<String, u64>
) -> Result<RecordOutcome, StoreError> {
    match store.get_variant(incoming.id())? {
        None => {
            store.insert_variant(incoming)?;
            Ok(RecordOutcome::Inserted)
        },
        Some(existing) => match merge_calls(&existing, dataset_id, calls) {
            Some((entries, total_call_count)) => {
                store.update_variant_calls(existing.id(), entries, total_call_count)?;
                Ok(RecordOutcome::Merged)
            },
            None => Ok(RecordOutcome::Unchanged)
        }
    }
}

/// Runs the per-record state machine; only a fatal store error is returned as `Err`
fn process_record<S: VariantStore + ?Sized>(
    store: &S, locks: &EngineLocks, config: &IngestConfig, record: RawVariantRecord
) -> Result<RecordOutcome, StoreError> {
    let calls = record.called_samples(&config.samples);
    if calls.is_empty() {
        return Ok(RecordOutcome::NotCalled);
    }

    let chrom = record.canonical_chromosome();
    if !config.allowed_chromosomes.contains(&chrom) {
        warn!("Skipping record at {}:{}, chromosome {chrom:?} is not allowed", record.chromosome, record.start);
        return Ok(RecordOutcome::SkippedChromosome);
    }

    let incoming = match StoredVariant::from_record(&record, &config.assembly_id, &config.dataset_id, calls.clone()) {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping record at {}:{}: {e}", record.chromosome, record.start);
            return Ok(RecordOutcome::Invalid);
        }
    };

    let variant_id = incoming.id().to_string();
    let result = locks.variants.with_lock(&variant_id, || {
        upsert_variant(store, &config.dataset_id, incoming, &calls)
    });
    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!("Failed to store variant {variant_id} ({}:{}): {e}", record.chromosome, record.start);
            Ok(RecordOutcome::Failed)
        }
    }
}

/// Checks the dataset and samples and pins down the assembly for the batch
fn resolve_config<S: VariantStore + ?Sized>(store: &S, config: &IngestConfig) -> Result<IngestConfig, IngestError> {
    let dataset = store.get_dataset(&config.dataset_id)?
        .ok_or_else(|| IngestError::UnknownDataset(config.dataset_id.clone()))?;
    if config.samples.is_empty() {
        return Err(IngestError::NoSamples);
    }

    let requested = config.assembly_id.trim();
    let assembly_id = match (dataset.assembly_id().filter(|a| !a.is_empty()), requested.is_empty()) {
        (Some(ds_asm), false) if ds_asm != requested => {
            return Err(IngestError::AssemblyMismatch {
                dataset_id: config.dataset_id.clone(),
                dataset_assembly: ds_asm.to_string(),
                assembly_id: requested.to_string()
            });
        },
        (_, false) => requested.to_string(),
        (Some(ds_asm), true) => ds_asm.to_string(),
        (None, true) => return Err(IngestError::MissingAssembly(config.dataset_id.clone()))
    };

    let mut resolved = config.clone();
    resolved.assembly_id = assembly_id;
    Ok(resolved)
}

/// Ingests a batch of records into one dataset and refreshes its rollup.
/// # Arguments
/// * `store` - the backing store
/// * `locks` - engine locks shared with every other ingestion and deletion
/// * `config` - batch settings
/// * `records` - the record source, consumed lazily
/// * `progress` - optional bar ticked once per record
/// # Errors
/// * if the dataset does not exist, no samples were given, or the assembly does not fit the dataset
/// * `StoreUnavailable` with the partial counts if the store goes away mid-batch
pub fn ingest_records<S, I>(
    store: &S, locks: &EngineLocks, config: &IngestConfig, records: I, progress: Option<&ProgressBar>
) -> Result<IngestSummary, IngestError>
where
    S: VariantStore + ?Sized,
    I: IntoIterator<Item = RawVariantRecord>,
    I::IntoIter: Send
{
    let config = resolve_config(store, config)?;
    info!(
        "Ingesting {} samples into {:?} ({}), {} thread(s)",
        config.samples.len(), config.dataset_id, config.assembly_id, config.threads.max(1)
    );

    let tick = || if let Some(bar) = progress { bar.inc(1); };
    let mut summary = IngestSummary::default();
    if config.threads <= 1 {
        for record in records {
            match process_record(store, locks, &config, record) {
                Ok(outcome) => tally(&mut summary, outcome),
                Err(source) => return Err(IngestError::StoreUnavailable { source, summary })
            };
            tick();
        }
    } else {
        let aborted = AtomicBool::new(false);
        let fatal: Mutex<Option<StoreError>> = Mutex::new(None);
        summary = records.into_iter()
            .par_bridge()
            .take_any_while(|_| !aborted.load(Ordering::Relaxed))
            .fold(IngestSummary::default, |mut acc, record| {
                match process_record(store, locks, &config, record) {
                    Ok(outcome) => tally(&mut acc, outcome),
                    Err(e) => {
                        aborted.store(true, Ordering::Relaxed);
                        fatal.lock().unwrap_or_else(PoisonError::into_inner).get_or_insert(e);
                    }
                };
                tick();
                acc
            })
            .reduce(IngestSummary::default, |mut a, b| {
                a += b;
                a
            });
        if let Some(source) = fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(IngestError::StoreUnavailable { source, summary });
        }
    }

    info!(
        "Finished {} records: {} inserted, {} merged, {} unchanged, {} not called, {} skipped, {} invalid, {} failed",
        summary.records, summary.inserted, summary.merged, summary.unchanged,
        summary.not_called, summary.skipped_chromosome, summary.invalid, summary.failed
    );
    recompute_rollup(store, locks, &config.dataset_id)?;
    Ok(summary)
}

/// The effect of removing samples from one variant
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SampleRemoval {
    /// None of the samples were present
    Untouched,
    /// Some calls were removed and the variant keeps at least one dataset entry
    Updated { dataset_entries: BTreeMap<String, DatasetEntry>, total_call_count: u64 },
    /// The variant has no dataset entries left and should be deleted
    Emptied,
}

/// Removes samples from one dataset entry of a variant.
/// # Arguments
/// * `existing` - the stored variant
/// * `dataset_id` - the dataset losing the samples
/// * `samples` - samples to remove
pub fn remove_calls(existing: &StoredVariant, dataset_id: &str, samples: &BTreeSet<String>) -> SampleRemoval {
    let mut entries = existing.dataset_entries.clone();
    let Some(entry) = entries.get_mut(dataset_id) else {
        return SampleRemoval::Untouched;
    };

    let mut removed = 0;
    let mut touched = false;
    for sample in samples.iter() {
        if let Some(count) = entry.samples.remove(sample) {
            removed += count;
            touched = true;
        }
    }
    if !touched {
        return SampleRemoval::Untouched;
    }

    entry.allele_count = entry.allele_count.saturating_sub(removed);
    if entry.samples.is_empty() {
        entries.remove(dataset_id);
    }
    if entries.is_empty() {
        SampleRemoval::Emptied
    } else {
        SampleRemoval::Updated {
            dataset_entries: entries,
            total_call_count: existing.total_call_count.saturating_sub(removed)
        }
    }
}

/// Deletes samples from a dataset and refreshes its rollup.
/// # Arguments
/// * `store` - the backing store
/// * `locks` - engine locks shared with every other ingestion and deletion
/// * `dataset_id` - the dataset losing the samples
/// * `samples` - samples to remove; all must currently contribute to the dataset
/// # Errors
/// * `UnknownDataset`, `NoSamples`, or `UnknownSamples` before anything is touched
/// * `Store` if the store becomes unavailable
pub fn delete_samples<S: VariantStore + ?Sized>(
    store: &S, locks: &EngineLocks, dataset_id: &str, samples: &BTreeSet<String>
) -> Result<DeleteSummary, IngestError> {
    let dataset = store.get_dataset(dataset_id)?
        .ok_or_else(|| IngestError::UnknownDataset(dataset_id.to_string()))?;
    if samples.is_empty() {
        return Err(IngestError::NoSamples);
    }
    let missing: Vec<String> = samples.difference(dataset.sample_set()).cloned().collect();
    if !missing.is_empty() {
        return Err(IngestError::UnknownSamples(missing));
    }

    info!("Removing {} samples from {dataset_id:?}", samples.len());
    let mut summary = DeleteSummary::default();
    for candidate in store.variants_in_dataset(dataset_id)? {
        let result = locks.variants.with_lock(candidate.id(), || -> Result<Option<bool>, StoreError> {
            // re-read under the lock, another batch may have changed it since the scan
            let Some(current) = store.get_variant(candidate.id())? else {
                return Ok(None);
            };
            match remove_calls(&current, dataset_id, samples) {
                SampleRemoval::Untouched => Ok(None),
                SampleRemoval::Updated { dataset_entries, total_call_count } => {
                    store.update_variant_calls(current.id(), dataset_entries, total_call_count)?;
                    Ok(Some(false))
                },
                SampleRemoval::Emptied => {
                    store.delete_variant(current.id())?;
                    Ok(Some(true))
                }
            }
        });
        match result {
            Ok(Some(true)) => summary.removed += 1,
            Ok(Some(false)) => summary.updated += 1,
            Ok(None) => {},
            Err(e) if e.is_fatal() => {
                error!("Aborting deletion after {} updated and {} removed variants", summary.updated, summary.removed);
                return Err(e.into());
            },
            Err(e) => {
                error!("Failed to update variant {}: {e}", candidate.id());
                summary.failed += 1;
            }
        };
    }

    debug!("Deletion summary for {dataset_id:?}: {summary:?}");
    recompute_rollup(store, locks, dataset_id)?;
    Ok(summary)
}
