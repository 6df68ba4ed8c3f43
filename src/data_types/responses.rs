use serde::Serialize;

use crate::data_types::allele_request::AlleleRequest;
use crate::data_types::dataset::{AccessLevel, Dataset};

/// Extra per-dataset detail that is not part of the match itself
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetResponseInfo {
    /// PUBLIC, REGISTERED, or CONTROLLED
    pub access_type: String,
}

/// The answer for one requested dataset
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetAlleleResponse {
    pub dataset_id: String,
    pub exists: bool,
    /// Dataset-wide rollup, only disclosed on a hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_count: Option<u64>,
    /// Dataset-wide rollup, only disclosed on a hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allele_count: Option<u64>,
    /// Calls supporting the matched variants in this dataset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_count: Option<u64>,
    /// Distinct samples carrying the matched variants in this dataset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,
    pub info: DatasetResponseInfo,
}

impl DatasetAlleleResponse {
    /// Response for a dataset where nothing matched
    pub fn miss(dataset: &Dataset) -> Self {
        Self {
            dataset_id: dataset.id().to_string(),
            exists: false,
            variant_count: None,
            allele_count: None,
            call_count: None,
            sample_count: None,
            info: DatasetResponseInfo { access_type: dataset.access_level().access_type().to_string() },
        }
    }

    /// Response for a dataset with at least one matching visible variant
    pub fn hit(dataset: &Dataset, call_count: u64, sample_count: u64) -> Self {
        Self {
            exists: true,
            variant_count: Some(dataset.variant_count()),
            allele_count: Some(dataset.allele_count()),
            call_count: Some(call_count),
            sample_count: Some(sample_count),
            ..Self::miss(dataset)
        }
    }
}

/// Machine-readable error block of a response
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_code: u16,
    pub error_name: String,
    pub error_message: String,
}

/// Full response to an allele query
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlleleResponse {
    pub beacon_id: String,
    pub api_version: String,
    /// Echo of the request exactly as received
    pub allele_request: AlleleRequest,
    /// `None` when the request failed validation
    pub exists: Option<bool>,
    pub error: Option<ErrorPayload>,
    pub dataset_responses: Vec<DatasetAlleleResponse>,
}

/// Public description of one dataset
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub access_level: AccessLevel,
    pub variant_count: u64,
    pub call_count: u64,
    pub sample_count: u64,
}

impl From<&Dataset> for DatasetInfo {
    fn from(dataset: &Dataset) -> Self {
        Self {
            id: dataset.id().to_string(),
            name: dataset.name().to_string(),
            assembly_id: dataset.assembly_id().map(String::from),
            description: dataset.description().map(String::from),
            access_level: dataset.access_level(),
            variant_count: dataset.variant_count(),
            call_count: dataset.allele_count(),
            sample_count: dataset.sample_set().len() as u64,
        }
    }
}

/// Summary of the beacon and everything it serves
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconInfo {
    pub id: String,
    pub name: String,
    pub api_version: String,
    pub version: String,
    pub datasets: Vec<DatasetInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::dataset::DatasetRollup;

    #[test]
    fn test_hit_and_miss_shape() {
        let mut ds = Dataset::new("ds1", "one", Some("GRCh37"), AccessLevel::Registered);
        ds.set_rollup(DatasetRollup {
            sample_set: ["s1".to_string()].into_iter().collect(),
            variant_count: 10,
            allele_count: 12
        });

        let miss = serde_json::to_value(DatasetAlleleResponse::miss(&ds)).unwrap();
        assert_eq!(miss["exists"], false);
        assert!(miss.get("variantCount").is_none());
        assert_eq!(miss["info"]["accessType"], "REGISTERED");

        let hit = DatasetAlleleResponse::hit(&ds, 2, 1);
        assert_eq!(hit.variant_count, Some(10));
        assert_eq!(hit.allele_count, Some(12));
        assert_eq!(hit.call_count, Some(2));
        let js = serde_json::to_value(&hit).unwrap();
        assert_eq!(js["datasetId"], "ds1");
        assert_eq!(js["sampleCount"], 1);
    }
}
