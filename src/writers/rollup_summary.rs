use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::dataset::Dataset;

/// This is a wrapper for writing out dataset rollups to a file
#[derive(Default)]
pub struct RollupSummaryWriter {
    /// One row per dataset, in the order they were added
    rows: Vec<RollupSummaryRow>
}

/// Contains all the data written to each row of our rollup file
#[derive(Debug, PartialEq, Serialize)]
struct RollupSummaryRow {
    /// Dataset identifier
    dataset_id: String,
    /// Display name
    name: String,
    /// Reference assembly, empty if not set
    assembly_id: String,
    /// PUBLIC, REGISTERED, or CONTROLLED
    access_type: String,
    /// Distinct variants with an entry for the dataset
    variant_count: u64,
    /// ALT allele calls across the dataset
    allele_count: u64,
    /// Distinct samples ingested
    sample_count: usize,
    /// Last time the rollup changed, RFC 3339
    updated: String
}

impl RollupSummaryRow {
    /// Creates a new row from a dataset and its current rollup
    fn new(dataset: &Dataset) -> Self {
        Self {
            dataset_id: dataset.id().to_string(),
            name: dataset.name().to_string(),
            assembly_id: dataset.assembly_id().unwrap_or_default().to_string(),
            access_type: dataset.access_level().access_type().to_string(),
            variant_count: dataset.variant_count(),
            allele_count: dataset.allele_count(),
            sample_count: dataset.sample_set().len(),
            updated: dataset.updated().to_rfc3339()
        }
    }
}

impl RollupSummaryWriter {
    /// Adds a dataset to the collection
    pub fn add_dataset(&mut self, dataset: &Dataset) {
        self.rows.push(RollupSummaryRow::new(dataset));
    }

    /// Will write the summary out to the given file path
    /// # Arguments
    /// * `filename` - the filename for the output (tsv/csv)
    pub fn write_summary(&self, filename: &Path) -> csv::Result<()> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;

        for row in self.rows.iter() {
            csv_writer.serialize(row)?;
        }

        // save everything
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::dataset::{AccessLevel, DatasetRollup};

    #[test]
    fn test_write_summary() {
        let mut dataset = Dataset::new("ds1", "Dataset one", Some("GRCh37"), AccessLevel::Registered);
        dataset.set_rollup(DatasetRollup {
            sample_set: ["s1".to_string(), "s2".to_string()].into_iter().collect(),
            variant_count: 3,
            allele_count: 5
        });
        let mut writer = RollupSummaryWriter::default();
        writer.add_dataset(&dataset);
        writer.add_dataset(&Dataset::new("ds2", "Dataset two", None, AccessLevel::Public));

        let tmp_dir = tempfile::tempdir().unwrap();
        let filename = tmp_dir.path().join("rollups.tsv");
        writer.write_summary(&filename).unwrap();

        let contents = std::fs::read_to_string(&filename).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "dataset_id\tname\tassembly_id\taccess_type\tvariant_count\tallele_count\tsample_count\tupdated");
        assert!(lines[1].starts_with("ds1\tDataset one\tGRCh37\tREGISTERED\t3\t5\t2\t"));
        assert!(lines[2].starts_with("ds2\tDataset two\t\tPUBLIC\t0\t0\t0\t"));
    }

    #[test]
    fn test_csv_delimiter() {
        let mut writer = RollupSummaryWriter::default();
        writer.add_dataset(&Dataset::new("ds1", "one", None, AccessLevel::Controlled));
        let tmp_dir = tempfile::tempdir().unwrap();
        let filename = tmp_dir.path().join("rollups.csv");
        writer.write_summary(&filename).unwrap();
        let contents = std::fs::read_to_string(&filename).unwrap();
        assert!(contents.lines().nth(1).unwrap().starts_with("ds1,one,,CONTROLLED,0,0,0,"));
    }
}
