use log::trace;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::allele_request::ResponseType;
use crate::data_types::dataset::Dataset;
use crate::data_types::responses::DatasetAlleleResponse;
use crate::data_types::variants::VariantHit;

/// Overall answer plus the per-dataset detail that may be disclosed
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Aggregate {
    pub exists: bool,
    pub dataset_responses: Vec<DatasetAlleleResponse>,
}

/// Builds the existence answer for a query.
/// Only datasets that are both requested and visible are considered; an empty request means every visible dataset.
/// Requested ids unknown to the store are skipped.
/// The overall `exists` never depends on `response_type`, which only controls disclosure.
/// # Arguments
/// * `response_type` - how much per-dataset detail to return
/// * `requested_dataset_ids` - requested ids in request order, empty for all
/// * `filtered` - candidates already narrowed by the access filter
/// * `datasets` - all dataset metadata keyed by id
/// * `visible` - dataset ids the caller may see
pub fn aggregate(
    response_type: ResponseType,
    requested_dataset_ids: &[String],
    filtered: &[VariantHit],
    datasets: &BTreeMap<String, Dataset>,
    visible: &BTreeSet<String>
) -> Aggregate {
    let scope: Vec<&Dataset> = if requested_dataset_ids.is_empty() {
        datasets.values().collect()
    } else {
        requested_dataset_ids.iter()
            .filter_map(|id| {
                let found = datasets.get(id);
                if found.is_none() {
                    trace!("Skipping unknown dataset {id:?}");
                }
                found
            })
            .collect()
    };

    let mut exists = false;
    let mut dataset_responses = vec![];
    for dataset in scope.into_iter().filter(|d| visible.contains(d.id())) {
        let mut call_count = 0;
        let mut samples: BTreeSet<&str> = BTreeSet::new();
        let mut hit = false;
        for candidate in filtered.iter() {
            if let Some(entry) = candidate.dataset_entries.get(dataset.id()) {
                hit = true;
                call_count += entry.allele_count;
                samples.extend(entry.samples.keys().map(|s| s.as_str()));
            }
        }
        exists |= hit;

        let include = match response_type {
            ResponseType::All => true,
            ResponseType::Hit => hit,
            ResponseType::Miss => !hit,
            ResponseType::None => false
        };
        if include {
            dataset_responses.push(if hit {
                DatasetAlleleResponse::hit(dataset, call_count, samples.len() as u64)
            } else {
                DatasetAlleleResponse::miss(dataset)
            });
        }
    }

    Aggregate { exists, dataset_responses }
}
