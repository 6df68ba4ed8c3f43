use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Who is allowed to see the calls from a dataset
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Visible to anyone, including unauthenticated callers
    #[default]
    #[strum(ascii_case_insensitive, serialize = "public")]
    #[clap(name = "public")]
    Public,
    /// Visible to callers that were granted this specific dataset
    #[strum(ascii_case_insensitive, serialize = "registered")]
    #[clap(name = "registered")]
    Registered,
    /// Visible to callers holding controlled access, e.g. bona fide researchers
    #[strum(ascii_case_insensitive, serialize = "controlled")]
    #[clap(name = "controlled")]
    Controlled,
}

impl AccessLevel {
    /// Label used in the per-dataset response `info.accessType`
    pub fn access_type(&self) -> &'static str {
        match self {
            AccessLevel::Public => "PUBLIC",
            AccessLevel::Registered => "REGISTERED",
            AccessLevel::Controlled => "CONTROLLED",
        }
    }
}

/// The derived counters of a dataset, always recomputed as a unit
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRollup {
    /// Samples currently contributing at least one variant
    pub sample_set: BTreeSet<String>,
    /// Number of stored variants with an entry for this dataset
    pub variant_count: u64,
    /// Sum of the dataset's allele counts across its variants
    pub allele_count: u64,
}

/// An access-controlled collection of samples
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    id: String,
    name: String,
    /// Genome build; datasets without one never trigger build mismatches
    #[serde(default)]
    assembly_id: Option<String>,
    access_level: AccessLevel,
    #[serde(default)]
    description: Option<String>,
    /// Rollup counters, only ever replaced wholesale
    #[serde(flatten)]
    rollup: DatasetRollup,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl Dataset {
    /// Creates an empty dataset, as done by the administrative tooling
    pub fn new(id: &str, name: &str, assembly_id: Option<&str>, access_level: AccessLevel) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            assembly_id: assembly_id.map(|a| a.to_string()),
            access_level,
            description: None,
            rollup: DatasetRollup::default(),
            created: now,
            updated: now,
        }
    }

    /// Builder-style description setter
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Replaces the rollup counters and bumps the update time
    pub fn set_rollup(&mut self, rollup: DatasetRollup) {
        self.rollup = rollup;
        self.updated = Utc::now();
    }

    // getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assembly_id(&self) -> Option<&str> {
        self.assembly_id.as_deref()
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn rollup(&self) -> &DatasetRollup {
        &self.rollup
    }

    pub fn sample_set(&self) -> &BTreeSet<String> {
        &self.rollup.sample_set
    }

    pub fn variant_count(&self) -> u64 {
        self.rollup.variant_count
    }

    pub fn allele_count(&self) -> u64 {
        self.rollup.allele_count
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }
}
