use serde::Serialize;
use std::ops::AddAssign;

/// Per-batch counters for an ingestion run.
/// `inserted` is the headline number; merges into existing variants are tracked separately.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Records read from the source
    pub records: u64,
    /// Variants that did not exist and were created
    pub inserted: u64,
    /// Existing variants that received at least one new sample call
    pub merged: u64,
    /// Existing variants where every incoming sample was already present
    pub unchanged: u64,
    /// Records not called in any sample of interest
    pub not_called: u64,
    /// Records on a chromosome outside the allow-list
    pub skipped_chromosome: u64,
    /// Records rejected during normalization
    pub invalid: u64,
    /// Records that failed to write
    pub failed: u64,
}

impl AddAssign for IngestSummary {
    // Enables += when combining batches
    fn add_assign(&mut self, rhs: Self) {
        self.records += rhs.records;
        self.inserted += rhs.inserted;
        self.merged += rhs.merged;
        self.unchanged += rhs.unchanged;
        self.not_called += rhs.not_called;
        self.skipped_chromosome += rhs.skipped_chromosome;
        self.invalid += rhs.invalid;
        self.failed += rhs.failed;
    }
}

impl IngestSummary {
    /// Number of records that actually touched the store
    pub fn written(&self) -> u64 {
        self.inserted + self.merged
    }
}

/// Counters for a sample deletion run
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DeleteSummary {
    /// Variants that lost samples but still have calls
    pub updated: u64,
    /// Variants removed because no dataset entry was left
    pub removed: u64,
    /// Variants that failed to update
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign() {
        let mut total = IngestSummary { records: 3, inserted: 2, merged: 1, ..Default::default() };
        total += IngestSummary { records: 2, inserted: 1, not_called: 1, ..Default::default() };
        assert_eq!(total.records, 5);
        assert_eq!(total.inserted, 3);
        assert_eq!(total.not_called, 1);
        assert_eq!(total.written(), 4);
    }
}
