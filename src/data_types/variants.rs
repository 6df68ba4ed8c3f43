use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::identity::{canonical_chromosome, VariantIdentity};

/// The structural variant classes we accept.
/// SNVs and small indels are never tagged, so they are represented by `None` wherever an `Option<SvType>` appears.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString)]
pub enum SvType {
    /// Tagged with SVTYPE=INS
    #[strum(ascii_case_insensitive, serialize = "INS")]
    #[serde(rename = "INS")]
    Insertion,
    /// Tagged with SVTYPE=DUP
    #[strum(ascii_case_insensitive, serialize = "DUP")]
    #[serde(rename = "DUP")]
    Duplication,
    /// Tagged with SVTYPE=DEL
    #[strum(ascii_case_insensitive, serialize = "DEL")]
    #[serde(rename = "DEL")]
    Deletion,
    /// Tagged with SVTYPE=INV
    #[strum(ascii_case_insensitive, serialize = "INV")]
    #[serde(rename = "INV")]
    Inversion,
    /// Tagged with SVTYPE=BND, must also carry a mate chromosome
    #[strum(ascii_case_insensitive, serialize = "BND")]
    #[serde(rename = "BND")]
    Breakend,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VariantError {
    #[error("reference allele is empty")]
    EmptyReference,
    #[error("alternate allele is empty")]
    EmptyAlternate,
    #[error("end ({end}) must be >= start ({start})")]
    EndBeforeStart { start: u64, end: u64 },
    #[error("BND variants require a mate chromosome")]
    MissingMate,
}

/// A single variant observation as it comes out of a record source.
/// Multi-allelic sites are expected to be split upstream, so there is exactly one ALT here.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawVariantRecord {
    /// Chromosome as written in the source file, canonicalized later
    pub chromosome: String,
    /// 0-based start coordinate
    pub start: u64,
    /// 0-based exclusive end coordinate, if known
    pub end: Option<u64>,
    /// REF allele
    pub reference_bases: String,
    /// The single ALT allele for this observation
    pub alternate_bases: String,
    /// Set for structural variants only
    pub variant_type: Option<SvType>,
    /// Mate chromosome, only for BND
    pub mate_name: Option<String>,
    /// Number of ALT alleles carried by each sample in the source; 0 means not called
    pub genotype_calls: BTreeMap<String, u64>,
}

impl RawVariantRecord {
    /// Returns the non-zero calls for the provided samples of interest.
    /// An empty map means the variant was not called in any of them.
    /// # Arguments
    /// * `samples` - the samples we are ingesting
    pub fn called_samples(&self, samples: &BTreeSet<String>) -> BTreeMap<String, u64> {
        self.genotype_calls.iter()
            .filter(|(sample, &calls)| calls > 0 && samples.contains(*sample))
            .map(|(sample, &calls)| (sample.clone(), calls))
            .collect()
    }

    /// Canonical chromosome name for this record
    pub fn canonical_chromosome(&self) -> String {
        canonical_chromosome(&self.chromosome)
    }
}

/// Per-dataset calls for a stored variant.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEntry {
    /// Sample name to call count
    pub samples: BTreeMap<String, u64>,
    /// Sum of the sample calls for this dataset
    pub allele_count: u64,
}

impl DatasetEntry {
    /// Builds an entry from a fresh set of sample calls
    pub fn from_calls(samples: BTreeMap<String, u64>) -> Self {
        let allele_count = samples.values().sum();
        Self { samples, allele_count }
    }
}

/// A distinct genomic alteration as kept in the store.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVariant {
    /// Content address derived from the identity fields
    id: String,
    reference_name: String,
    /// 0-based start
    start: u64,
    /// 0-based exclusive end, absent for SVs without a precise breakpoint
    end: Option<u64>,
    reference_bases: String,
    alternate_bases: String,
    assembly_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variant_type: Option<SvType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mate_name: Option<String>,
    /// Dataset id to per-dataset calls
    pub dataset_entries: BTreeMap<String, DatasetEntry>,
    /// Sum of `allele_count` across all dataset entries
    pub total_call_count: u64,
}

impl StoredVariant {
    /// Normalizes a raw record into a new stored variant with a single dataset entry.
    /// # Arguments
    /// * `record` - the raw observation
    /// * `assembly_id` - genome build the record was called against
    /// * `dataset_id` - the dataset receiving the calls
    /// * `calls` - the non-zero sample calls for this dataset
    /// # Errors
    /// * if either allele is empty
    /// * if the end coordinate precedes the start
    /// * if a BND record has no mate chromosome
    pub fn from_record(
        record: &RawVariantRecord, assembly_id: &str,
        dataset_id: &str, calls: BTreeMap<String, u64>
    ) -> Result<Self, VariantError> {
        if record.reference_bases.is_empty() {
            return Err(VariantError::EmptyReference);
        }
        if record.alternate_bases.is_empty() {
            return Err(VariantError::EmptyAlternate);
        }
        if let Some(end) = record.end {
            if end < record.start {
                return Err(VariantError::EndBeforeStart { start: record.start, end });
            }
        }
        if record.variant_type == Some(SvType::Breakend) && record.mate_name.is_none() {
            return Err(VariantError::MissingMate);
        }

        let identity = VariantIdentity::new(
            &record.chromosome, record.start, record.end,
            &record.reference_bases, &record.alternate_bases, assembly_id
        );
        let entry = DatasetEntry::from_calls(calls);
        let total_call_count = entry.allele_count;
        let mut dataset_entries = BTreeMap::new();
        dataset_entries.insert(dataset_id.to_string(), entry);

        Ok(Self {
            id: identity.id(),
            reference_name: identity.reference_name,
            start: identity.start,
            end: identity.end,
            reference_bases: identity.reference_bases,
            alternate_bases: identity.alternate_bases,
            assembly_id: identity.assembly_id,
            variant_type: record.variant_type,
            mate_name: record.mate_name.as_deref().map(canonical_chromosome),
            dataset_entries,
            total_call_count,
        })
    }

    /// Sum of the per-dataset allele counts, used to check the running total
    pub fn summed_allele_count(&self) -> u64 {
        self.dataset_entries.values().map(|e| e.allele_count).sum()
    }

    /// Reduces this variant down to what the query path needs
    pub fn to_hit(&self) -> VariantHit {
        VariantHit {
            id: self.id.clone(),
            dataset_entries: self.dataset_entries.clone(),
        }
    }

    /// Rebuilds the identity fields, mostly for re-deriving the id
    pub fn identity(&self) -> VariantIdentity {
        VariantIdentity {
            reference_name: self.reference_name.clone(),
            start: self.start,
            end: self.end,
            reference_bases: self.reference_bases.clone(),
            alternate_bases: self.alternate_bases.clone(),
            assembly_id: self.assembly_id.clone(),
        }
    }

    // getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn reference_bases(&self) -> &str {
        &self.reference_bases
    }

    pub fn alternate_bases(&self) -> &str {
        &self.alternate_bases
    }

    pub fn assembly_id(&self) -> &str {
        &self.assembly_id
    }

    pub fn variant_type(&self) -> Option<SvType> {
        self.variant_type
    }

    pub fn mate_name(&self) -> Option<&str> {
        self.mate_name.as_deref()
    }
}

/// Partial variant returned by predicate lookups: identity plus the per-dataset calls.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VariantHit {
    pub id: String,
    pub dataset_entries: BTreeMap<String, DatasetEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RawVariantRecord {
        RawVariantRecord {
            chromosome: "chr1".to_string(),
            start: 100,
            end: Some(101),
            reference_bases: "a".to_string(),
            alternate_bases: "t".to_string(),
            genotype_calls: [
                ("s1".to_string(), 1),
                ("s2".to_string(), 0),
                ("s3".to_string(), 2),
            ].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_called_samples() {
        let rec = record();
        let wanted: BTreeSet<String> = ["s1".to_string(), "s2".to_string()].into_iter().collect();
        let calls = rec.called_samples(&wanted);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls["s1"], 1);

        let nobody: BTreeSet<String> = ["s2".to_string()].into_iter().collect();
        assert!(rec.called_samples(&nobody).is_empty());
    }

    #[test]
    fn test_from_record_normalizes() {
        let rec = record();
        let calls = rec.genotype_calls.clone().into_iter().filter(|(_, c)| *c > 0).collect();
        let variant = StoredVariant::from_record(&rec, "GRCh37", "ds1", calls).unwrap();
        assert_eq!(variant.reference_name(), "1");
        assert_eq!(variant.reference_bases(), "A");
        assert_eq!(variant.alternate_bases(), "T");
        assert_eq!(variant.total_call_count, 3);
        assert_eq!(variant.dataset_entries["ds1"].allele_count, 3);
        assert_eq!(variant.summed_allele_count(), variant.total_call_count);
        assert_eq!(variant.id(), variant.identity().id());
    }

    #[test]
    fn test_from_record_errors() {
        let mut rec = record();
        rec.alternate_bases.clear();
        assert_eq!(
            StoredVariant::from_record(&rec, "GRCh37", "ds1", BTreeMap::new()),
            Err(VariantError::EmptyAlternate)
        );

        let mut rec = record();
        rec.end = Some(50);
        assert_eq!(
            StoredVariant::from_record(&rec, "GRCh37", "ds1", BTreeMap::new()),
            Err(VariantError::EndBeforeStart { start: 100, end: 50 })
        );

        let mut rec = record();
        rec.variant_type = Some(SvType::Breakend);
        assert_eq!(
            StoredVariant::from_record(&rec, "GRCh37", "ds1", BTreeMap::new()),
            Err(VariantError::MissingMate)
        );
    }

    #[test]
    fn test_sv_type_strings() {
        assert_eq!(SvType::Breakend.to_string(), "BND");
        assert_eq!("dup".parse::<SvType>().unwrap(), SvType::Duplication);
        assert!("CNV".parse::<SvType>().is_err());
        assert_eq!(serde_json::to_string(&SvType::Inversion).unwrap(), "\"INV\"");
    }
}
