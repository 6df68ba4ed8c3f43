use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::access::CallerAccessProfile;
use crate::data_types::dataset::{AccessLevel, Dataset};
use crate::data_types::variants::VariantHit;

/// Dataset ids the caller may see: public ones, the ones registered to the caller,
/// and every controlled one if the caller holds controlled access.
/// # Arguments
/// * `profile` - the resolved caller profile
/// * `datasets` - all dataset metadata keyed by id
pub fn visible_dataset_ids(profile: &CallerAccessProfile, datasets: &BTreeMap<String, Dataset>) -> BTreeSet<String> {
    let mut visible: BTreeSet<String> = datasets.values()
        .filter(|d| match d.access_level() {
            AccessLevel::Public => true,
            AccessLevel::Registered => false,
            AccessLevel::Controlled => profile.has_controlled_access()
        })
        .map(|d| d.id().to_string())
        .collect();
    visible.extend(profile.registered_dataset_ids().iter().cloned());
    visible
}

/// Narrows candidates down to what the caller may see.
/// Each candidate keeps only its visible dataset entries; candidates left with none are dropped.
/// # Arguments
/// * `candidates` - partial variants from the store lookup
/// * `profile` - the resolved caller profile
/// * `datasets` - all dataset metadata keyed by id
pub fn filter_candidates(
    candidates: Vec<VariantHit>, profile: &CallerAccessProfile, datasets: &BTreeMap<String, Dataset>
) -> Vec<VariantHit> {
    let visible = visible_dataset_ids(profile, datasets);
    filter_with_visible(candidates, &visible)
}

/// Same as [`filter_candidates`] with a precomputed visible set
pub fn filter_with_visible(candidates: Vec<VariantHit>, visible: &BTreeSet<String>) -> Vec<VariantHit> {
    candidates.into_iter()
        .filter_map(|mut hit| {
            hit.dataset_entries.retain(|dataset_id, _| visible.contains(dataset_id));
            if hit.dataset_entries.is_empty() {
                None
            } else {
                Some(hit)
            }
        })
        .collect()
}
