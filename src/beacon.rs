/*!
# Beacon
Ties the engine together behind a single handle.
Queries run Query Normalizer -> store lookup -> Access Filter -> Response Aggregator and never write.
Ingestion and deletion share the same lock arena, so any number of batches may run at once against one store.

## Example usage
```rust
use allele_beacon::beacon::{Beacon, BeaconConfig};
use allele_beacon::data_types::access::CallerAccessProfile;
use allele_beacon::data_types::allele_request::AlleleRequest;
use allele_beacon::data_types::dataset::{AccessLevel, Dataset};
use allele_beacon::data_types::variants::RawVariantRecord;
use allele_beacon::merge_engine::IngestConfigBuilder;
use allele_beacon::store::memory::InMemoryStore;

let beacon = Beacon::new(BeaconConfig::default(), InMemoryStore::default());
beacon.add_dataset(Dataset::new("public1", "Public one", Some("GRCh37"), AccessLevel::Public)).unwrap();

let record = RawVariantRecord {
    chromosome: "1".to_string(),
    start: 100,
    end: Some(101),
    reference_bases: "A".to_string(),
    alternate_bases: "T".to_string(),
    genotype_calls: [("s1".to_string(), 1)].into_iter().collect(),
    ..Default::default()
};
let config = IngestConfigBuilder::default()
    .dataset_id("public1".to_string())
    .samples(["s1".to_string()].into_iter().collect())
    .build().unwrap();
beacon.ingest(&config, vec![record], None).unwrap();

let request = AlleleRequest::from_pairs([
    ("referenceName", "1"), ("start", "100"), ("referenceBases", "A"),
    ("alternateBases", "T"), ("assemblyId", "GRCh37"), ("includeDatasetResponses", "HIT"),
]);
let response = beacon.query(&request, &CallerAccessProfile::public_only()).unwrap();
assert_eq!(response.exists, Some(true));
assert_eq!(response.dataset_responses.len(), 1);
```
*/

use derive_builder::Builder;
use indicatif::ProgressBar;
use log::{debug, info};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::access_filter::{filter_with_visible, visible_dataset_ids};
use crate::data_types::access::CallerAccessProfile;
use crate::data_types::allele_request::AlleleRequest;
use crate::data_types::dataset::Dataset;
use crate::data_types::ingest_summary::{DeleteSummary, IngestSummary};
use crate::data_types::predicate::MatchPredicate;
use crate::data_types::responses::{AlleleResponse, BeaconInfo, DatasetInfo};
use crate::data_types::variants::RawVariantRecord;
use crate::merge_engine::{delete_samples, ingest_records, IngestConfig, IngestError};
use crate::query_normalizer::{prepare_query, QueryError};
use crate::response_aggregator::aggregate;
use crate::store::{StoreError, VariantStore};
use crate::util::keyed_locks::EngineLocks;

/// Identity of this beacon, stamped on every response
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct BeaconConfig {
    beacon_id: String,
    beacon_name: String,
    api_version: String,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            beacon_id: "allele-beacon".to_string(),
            beacon_name: "Allele beacon".to_string(),
            api_version: "v1.0.1".to_string(),
        }
    }
}

impl BeaconConfig {
    // getters
    pub fn beacon_id(&self) -> &str {
        &self.beacon_id
    }

    pub fn beacon_name(&self) -> &str {
        &self.beacon_name
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}

/// A store plus the locks that make concurrent batches safe on it
pub struct Beacon<S: VariantStore + 'static> {
    config: BeaconConfig,
    store: Arc<S>,
    locks: Arc<EngineLocks>,
}

impl<S: VariantStore + 'static> Clone for Beacon<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: VariantStore + 'static> Beacon<S> {
    /// Wraps a store with a fresh lock arena
    pub fn new(config: BeaconConfig, store: S) -> Self {
        Self::with_shared(config, Arc::new(store), Arc::new(EngineLocks::default()))
    }

    /// Builds on an already shared store and lock arena
    pub fn with_shared(config: BeaconConfig, store: Arc<S>, locks: Arc<EngineLocks>) -> Self {
        Self { config, store, locks }
    }

    /// Answers an allele query for a caller.
    /// Validation failures are not errors here; they come back as a response carrying the error block.
    /// # Arguments
    /// * `request` - the raw request, echoed back in the response
    /// * `profile` - what the caller may see
    /// # Errors
    /// * if the store cannot be read
    pub fn query(&self, request: &AlleleRequest, profile: &CallerAccessProfile) -> Result<AlleleResponse, StoreError> {
        let datasets = self.store.datasets_by_id()?;
        let prepared = match prepare_query(request, &datasets) {
            Ok(p) => p,
            Err(e) => {
                debug!("Rejected query: {e}");
                return Ok(self.error_response(&e));
            }
        };

        let visible = visible_dataset_ids(profile, &datasets);
        let candidates = if has_no_possible_match(&prepared.predicate) {
            vec![]
        } else {
            self.store.query_variants(&prepared.predicate)?
        };
        let candidate_count = candidates.len();
        let filtered = filter_with_visible(candidates, &visible);
        debug!("{candidate_count} candidates, {} visible", filtered.len());

        let result = aggregate(
            prepared.response_type, &prepared.requested_dataset_ids,
            &filtered, &datasets, &visible
        );
        Ok(AlleleResponse {
            beacon_id: self.config.beacon_id.clone(),
            api_version: self.config.api_version.clone(),
            allele_request: request.clone(),
            exists: Some(result.exists),
            error: None,
            dataset_responses: result.dataset_responses,
        })
    }

    fn error_response(&self, error: &QueryError) -> AlleleResponse {
        AlleleResponse {
            beacon_id: self.config.beacon_id.clone(),
            api_version: self.config.api_version.clone(),
            allele_request: (*error.request).clone(),
            exists: None,
            error: Some(error.payload()),
            dataset_responses: vec![],
        }
    }

    /// Runs an ingestion batch on the calling thread
    /// # Errors
    /// * see [`ingest_records`]
    pub fn ingest<I>(&self, config: &IngestConfig, records: I, progress: Option<&ProgressBar>) -> Result<IngestSummary, IngestError>
    where
        I: IntoIterator<Item = RawVariantRecord>,
        I::IntoIter: Send
    {
        ingest_records(self.store.as_ref(), &self.locks, config, records, progress)
    }

    /// Starts an ingestion batch in the background and returns immediately.
    /// Completion is only observable through the handle or the dataset rollups.
    pub fn spawn_ingest<I>(&self, config: IngestConfig, records: I) -> JoinHandle<Result<IngestSummary, IngestError>>
    where
        I: IntoIterator<Item = RawVariantRecord> + Send + 'static,
        I::IntoIter: Send
    {
        let store = self.store.clone();
        let locks = self.locks.clone();
        info!("Queueing background ingestion into {:?}", config.dataset_id());
        std::thread::spawn(move || {
            ingest_records(store.as_ref(), &locks, &config, records, None)
        })
    }

    /// Removes samples from a dataset
    /// # Errors
    /// * see [`delete_samples`]
    pub fn delete_samples(&self, dataset_id: &str, samples: &BTreeSet<String>) -> Result<DeleteSummary, IngestError> {
        delete_samples(self.store.as_ref(), &self.locks, dataset_id, samples)
    }

    /// Registers a new, empty dataset
    pub fn add_dataset(&self, dataset: Dataset) -> Result<(), StoreError> {
        info!("Adding dataset {:?} ({})", dataset.id(), dataset.access_level());
        self.store.insert_dataset(dataset)
    }

    /// Describes the beacon and its datasets
    pub fn info(&self) -> Result<BeaconInfo, StoreError> {
        let datasets = self.store.list_datasets()?;
        Ok(BeaconInfo {
            id: self.config.beacon_id.clone(),
            name: self.config.beacon_name.clone(),
            api_version: self.config.api_version.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            datasets: datasets.iter().map(DatasetInfo::from).collect(),
        })
    }

    // getters
    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.store.as_ref()
    }

    pub fn locks(&self) -> &EngineLocks {
        self.locks.as_ref()
    }
}

/// Out-of-order bounds cannot match anything, so the store lookup is skipped
fn has_no_possible_match(predicate: &MatchPredicate) -> bool {
    match predicate {
        MatchPredicate::ExactId { .. } => false,
        MatchPredicate::Structural { position, .. } => position.is_empty_range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::dataset::AccessLevel;
    use crate::data_types::variants::SvType;
    use crate::merge_engine::IngestConfigBuilder;
    use crate::store::memory::InMemoryStore;

    fn snv(start: u64, reference: &str, alt: &str, calls: &[(&str, u64)]) -> RawVariantRecord {
        RawVariantRecord {
            chromosome: "chr1".to_string(),
            start,
            end: Some(start + reference.len() as u64),
            reference_bases: reference.to_string(),
            alternate_bases: alt.to_string(),
            genotype_calls: calls.iter().map(|(s, c)| (s.to_string(), *c)).collect(),
            ..Default::default()
        }
    }

    fn ingest_config(dataset_id: &str, samples: &[&str]) -> IngestConfig {
        IngestConfigBuilder::default()
            .dataset_id(dataset_id.to_string())
            .samples(samples.iter().map(|s| s.to_string()).collect())
            .build().unwrap()
    }

    fn beacon() -> Beacon<InMemoryStore> {
        let beacon = Beacon::new(BeaconConfig::default(), InMemoryStore::default());
        beacon.add_dataset(Dataset::new("public1", "Public", Some("GRCh37"), AccessLevel::Public)).unwrap();
        beacon.add_dataset(Dataset::new("reg1", "Registered", Some("GRCh37"), AccessLevel::Registered)).unwrap();
        beacon.add_dataset(Dataset::new("ctrl1", "Controlled", Some("GRCh37"), AccessLevel::Controlled)).unwrap();
        beacon
    }

    fn request(pairs: &[(&str, &str)]) -> AlleleRequest {
        AlleleRequest::from_pairs(pairs.iter().copied())
    }

    fn hit_ids(response: &AlleleResponse) -> Vec<&str> {
        response.dataset_responses.iter().map(|r| r.dataset_id.as_str()).collect()
    }

    #[test]
    fn test_public_hit_scenario() {
        let beacon = beacon();
        beacon.ingest(&ingest_config("public1", &["s1"]), vec![snv(100, "A", "T", &[("s1", 1)])], None).unwrap();

        let req = request(&[
            ("referenceName", "1"), ("start", "100"), ("referenceBases", "A"),
            ("alternateBases", "T"), ("assemblyId", "GRCh37"), ("includeDatasetResponses", "HIT"),
        ]);
        let response = beacon.query(&req, &CallerAccessProfile::public_only()).unwrap();
        assert_eq!(response.exists, Some(true));
        assert_eq!(response.error, None);
        assert_eq!(hit_ids(&response), vec!["public1"]);
        assert!(response.dataset_responses[0].exists);
        assert_eq!(response.dataset_responses[0].call_count, Some(1));
        assert_eq!(response.allele_request, req);
    }

    #[test]
    fn test_controlled_without_access_scenario() {
        let beacon = beacon();
        beacon.ingest(&ingest_config("ctrl1", &["s1"]), vec![snv(100, "A", "T", &[("s1", 1)])], None).unwrap();

        let req = request(&[
            ("referenceName", "1"), ("start", "100"), ("referenceBases", "A"),
            ("alternateBases", "T"), ("assemblyId", "GRCh37"), ("includeDatasetResponses", "HIT"),
        ]);
        let response = beacon.query(&req, &CallerAccessProfile::public_only()).unwrap();
        assert_eq!(response.exists, Some(false));
        assert!(response.dataset_responses.is_empty());

        // registered access to other datasets does not help
        let registered = CallerAccessProfile::new(["reg1".to_string()].into_iter().collect(), false);
        assert_eq!(beacon.query(&req, &registered).unwrap().exists, Some(false));

        let controlled = CallerAccessProfile::new(BTreeSet::new(), true);
        let response = beacon.query(&req, &controlled).unwrap();
        assert_eq!(response.exists, Some(true));
        assert_eq!(hit_ids(&response), vec!["ctrl1"]);
    }

    #[test]
    fn test_wildcard_scenario() {
        let beacon = beacon();
        beacon.ingest(&ingest_config("public1", &["s1"]), vec![
            snv(100, "AA", "AT", &[("s1", 1)]),
            snv(200, "AA", "CC", &[("s1", 1)]),
        ], None).unwrap();

        let query_at = |start: &str| request(&[
            ("referenceName", "1"), ("start", start), ("end", "999"), ("referenceBases", "AA"),
            ("alternateBases", "NT"), ("assemblyId", "GRCh37"),
        ]);
        let profile = CallerAccessProfile::public_only();
        // end does not match either variant, so the wildcard must go through the structural path
        assert_eq!(beacon.query(&query_at("100"), &profile).unwrap().exists, Some(false));

        let open_end = |start: &str| request(&[
            ("referenceName", "1"), ("start", start), ("referenceBases", "AA"),
            ("alternateBases", "NT"), ("assemblyId", "GRCh37"),
        ]);
        assert_eq!(beacon.query(&open_end("100"), &profile).unwrap().exists, Some(true));
        assert_eq!(beacon.query(&open_end("200"), &profile).unwrap().exists, Some(false));
    }

    #[test]
    fn test_none_privacy() {
        let beacon = beacon();
        beacon.ingest(&ingest_config("public1", &["s1"]), vec![snv(100, "A", "T", &[("s1", 1)])], None).unwrap();
        let profile = CallerAccessProfile::new(["reg1".to_string()].into_iter().collect(), true);

        for (alt, expected) in [("T", true), ("G", false)] {
            let req = request(&[
                ("referenceName", "1"), ("start", "100"), ("referenceBases", "A"),
                ("alternateBases", alt), ("assemblyId", "GRCh37"), ("includeDatasetResponses", "NONE"),
            ]);
            let response = beacon.query(&req, &profile).unwrap();
            assert_eq!(response.exists, Some(expected));
            assert!(response.dataset_responses.is_empty());
        }
    }

    #[test]
    fn test_all_and_miss() {
        let beacon = beacon();
        beacon.ingest(&ingest_config("public1", &["s1"]), vec![snv(100, "A", "T", &[("s1", 1)])], None).unwrap();
        let profile = CallerAccessProfile::new(["reg1".to_string()].into_iter().collect(), false);

        let base = [
            ("referenceName", "1"), ("start", "100"), ("referenceBases", "A"),
            ("alternateBases", "T"), ("assemblyId", "GRCh37"),
        ];
        let mut all = request(&base);
        all.include_dataset_responses = Some("all".to_string());
        let response = beacon.query(&all, &profile).unwrap();
        // ctrl1 is invisible to this caller and never reported
        assert_eq!(hit_ids(&response), vec!["public1", "reg1"]);

        let mut miss = request(&base);
        miss.include_dataset_responses = Some("MISS".to_string());
        let response = beacon.query(&miss, &profile).unwrap();
        assert_eq!(response.exists, Some(true));
        assert_eq!(hit_ids(&response), vec!["reg1"]);
        assert_eq!(response.dataset_responses[0].info.access_type, "REGISTERED");
    }

    #[test]
    fn test_structural_range_query() {
        let beacon = beacon();
        let del = RawVariantRecord {
            chromosome: "2".to_string(),
            start: 1000,
            end: Some(5000),
            reference_bases: "G".to_string(),
            alternate_bases: "<DEL>".to_string(),
            variant_type: Some(SvType::Deletion),
            genotype_calls: [("s1".to_string(), 2)].into_iter().collect(),
            ..Default::default()
        };
        beacon.ingest(&ingest_config("public1", &["s1"]), vec![del], None).unwrap();
        let profile = CallerAccessProfile::public_only();

        let ranged = |start_min: &str, start_max: &str| request(&[
            ("referenceName", "2"), ("referenceBases", "G"), ("variantType", "DEL"),
            ("startMin", start_min), ("startMax", start_max), ("endMin", "4000"), ("assemblyId", "GRCh37"),
        ]);
        assert_eq!(beacon.query(&ranged("900", "1100"), &profile).unwrap().exists, Some(true));
        assert_eq!(beacon.query(&ranged("1001", "1100"), &profile).unwrap().exists, Some(false));
        // out-of-order bounds are accepted and simply match nothing
        let response = beacon.query(&ranged("1100", "900"), &profile).unwrap();
        assert_eq!(response.error, None);
        assert_eq!(response.exists, Some(false));
    }

    #[test]
    fn test_validation_error_response() {
        let beacon = beacon();
        let req = request(&[("referenceName", "1"), ("referenceBases", "A"), ("assemblyId", "GRCh37"), ("alternateBases", "T")]);
        let response = beacon.query(&req, &CallerAccessProfile::public_only()).unwrap();
        assert_eq!(response.exists, None);
        let error = response.error.unwrap();
        assert_eq!(error.error_name, "NoPositionParams");
        assert_eq!(error.error_code, 400);
        assert_eq!(response.allele_request, req);

        let mut unknown = request(&[
            ("referenceName", "1"), ("start", "100"), ("referenceBases", "A"),
            ("alternateBases", "T"), ("assemblyId", "GRCh37"),
        ]);
        unknown.dataset_ids = vec!["nope".to_string()];
        let response = beacon.query(&unknown, &CallerAccessProfile::public_only()).unwrap();
        assert_eq!(response.error.unwrap().error_name, "UnknownDatasets");
    }

    #[test]
    fn test_spawn_ingest() {
        let beacon = beacon();
        let handles: Vec<_> = (0..4).map(|i| {
            let sample = format!("s{i}");
            let records = vec![snv(100, "A", "T", &[(sample.as_str(), 1)])];
            beacon.spawn_ingest(ingest_config("public1", &[sample.as_str()]), records)
        }).collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let ds = beacon.store().get_dataset("public1").unwrap().unwrap();
        assert_eq!(ds.variant_count(), 1);
        assert_eq!(ds.allele_count(), 4);
        assert_eq!(ds.sample_set().len(), 4);

        let info = beacon.info().unwrap();
        assert_eq!(info.datasets.len(), 3);
        assert_eq!(info.id, "allele-beacon");
    }

    #[test]
    fn test_vcf_exact_identity() {
        use crate::parsing::vcf_source::VcfRecordSource;
        use crate::query_normalizer::prepare_query;
        use std::path::Path;

        let beacon = beacon();
        let records: Vec<RawVariantRecord> = VcfRecordSource::from_path(Path::new("test_data/trio.vcf")).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        let summary = beacon.ingest(&ingest_config("public1", &["proband", "mother"]), records, None).unwrap();
        assert_eq!(summary.failed, 0);

        let profile = CallerAccessProfile::public_only();
        let datasets = beacon.store().datasets_by_id().unwrap();
        let exact = |start: &str, end: &str, reference: &str, alt: &str| request(&[
            ("referenceName", "chr1"), ("start", start), ("end", end),
            ("referenceBases", reference), ("alternateBases", alt), ("assemblyId", "GRCh37"),
        ]);

        for req in [exact("100", "101", "A", "T"), exact("150", "151", "C", "CT"), exact("150", "151", "c", "ct")] {
            let prepared = prepare_query(&req, &datasets).unwrap();
            assert!(matches!(prepared.predicate, MatchPredicate::ExactId { .. }));
            assert_eq!(beacon.query(&req, &profile).unwrap().exists, Some(true));
        }

        // end is one past the reference, anything else is a different variant
        let off_by_one = exact("150", "152", "C", "CT");
        assert!(matches!(prepare_query(&off_by_one, &datasets).unwrap().predicate, MatchPredicate::ExactId { .. }));
        assert_eq!(beacon.query(&off_by_one, &profile).unwrap().exists, Some(false));

        let del = request(&[
            ("referenceName", "2"), ("start", "5100"), ("end", "5300"),
            ("referenceBases", "T"), ("alternateBases", "<DEL>"), ("assemblyId", "GRCh37"),
        ]);
        assert!(matches!(prepare_query(&del, &datasets).unwrap().predicate, MatchPredicate::ExactId { .. }));
        assert_eq!(beacon.query(&del, &profile).unwrap().exists, Some(true));
    }
}
