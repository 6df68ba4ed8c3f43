use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How much per-dataset detail a caller asked for.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString)]
pub enum ResponseType {
    /// Every requested dataset, hit or not
    #[strum(ascii_case_insensitive, serialize = "ALL")]
    #[serde(rename = "ALL")]
    All,
    /// Only datasets where the allele exists
    #[strum(ascii_case_insensitive, serialize = "HIT")]
    #[serde(rename = "HIT")]
    Hit,
    /// Only datasets where the allele does not exist
    #[strum(ascii_case_insensitive, serialize = "MISS")]
    #[serde(rename = "MISS")]
    Miss,
    /// No per-dataset detail at all
    #[default]
    #[strum(ascii_case_insensitive, serialize = "NONE")]
    #[serde(rename = "NONE")]
    None,
}

/// The raw, unvalidated allele request as received from a caller.
/// Every scalar is kept as an optional string so it can be echoed back verbatim on error;
/// coordinates may arrive as JSON numbers and blank strings are treated as absent.
/// Surrounding whitespace is only stripped during validation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlleleRequest {
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub reference_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub reference_bases: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub alternate_bases: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub variant_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub mate_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub start_min: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub start_max: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub end_min: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub end_max: Option<String>,
    #[serde(default)]
    pub dataset_ids: Vec<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub include_dataset_responses: Option<String>,
}

impl AlleleRequest {
    /// Builds a request from GET-style key/value pairs.
    /// Unknown keys are ignored, repeated `datasetIds` accumulate, and blank values are dropped.
    /// # Arguments
    /// * `pairs` - the decoded query-string pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>
    {
        let mut request = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            if value.trim().is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "referenceName" => &mut request.reference_name,
                "referenceBases" => &mut request.reference_bases,
                "assemblyId" => &mut request.assembly_id,
                "alternateBases" => &mut request.alternate_bases,
                "variantType" => &mut request.variant_type,
                "mateName" => &mut request.mate_name,
                "start" => &mut request.start,
                "end" => &mut request.end,
                "startMin" => &mut request.start_min,
                "startMax" => &mut request.start_max,
                "endMin" => &mut request.end_min,
                "endMax" => &mut request.end_max,
                "includeDatasetResponses" => &mut request.include_dataset_responses,
                "datasetIds" => {
                    request.dataset_ids.push(value.to_string());
                    continue;
                },
                other => {
                    debug!("Ignoring unknown request parameter {other:?}");
                    continue;
                }
            };
            *slot = Some(value.to_string());
        }
        request
    }

    /// Parses `includeDatasetResponses`, defaulting to `NONE`
    pub fn response_type(&self) -> ResponseType {
        match self.include_dataset_responses.as_deref() {
            None => ResponseType::None,
            Some(raw) => match raw.trim().parse::<ResponseType>() {
                Ok(rt) => rt,
                Err(_) => {
                    warn!("Unrecognized includeDatasetResponses value {raw:?}, falling back to NONE");
                    ResponseType::None
                }
            }
        }
    }

    /// True if any of the four range bounds were provided
    pub fn has_range_bounds(&self) -> bool {
        self.start_min.is_some() || self.start_max.is_some() ||
            self.end_min.is_some() || self.end_max.is_some()
    }
}

/// Accepts strings, numbers or null; empty strings become `None`
fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
