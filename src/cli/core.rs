use anyhow::bail;
use clap::{Parser, Subcommand};
use chrono::Datelike;
use itertools::Itertools;
use lazy_static::lazy_static;
use std::path::Path;

use crate::cli::dataset::{AddDatasetSettings, DatasetsSettings};
use crate::cli::delete::DeleteSettings;
use crate::cli::ingest::IngestSettings;
use crate::cli::query::QuerySettings;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.3.1-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.1-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string
    pub static ref AFTER_HELP: String = format!("Copyright (C) {}     allele-beacon contributors
Released under the MIT license. Query answers only reveal whether an allele
was observed, never which samples carry it.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// allele-beacon, answers "does anyone have this allele?" without exposing who.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Registers a new, empty dataset in the database
    AddDataset(Box<AddDatasetSettings>),
    /// Merges the calls of selected VCF samples into a dataset
    Ingest(Box<IngestSettings>),
    /// Removes samples from a dataset
    Delete(Box<DeleteSettings>),
    /// Answers an allele query against the database
    Query(Box<QuerySettings>),
    /// Lists the datasets and their rollups
    Datasets(Box<DatasetsSettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{} does not exist: \"{}\"", label, filename.display());
    }

    // file exists
    Ok(())
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_optional_filename(opt_filename: Option<&Path>, label: &str) -> anyhow::Result<()> {
    if let Some(filename) = opt_filename {
        if !filename.exists() {
            bail!("{} does not exist: \"{}\"", label, filename.display());
        }
    }

    // file either was not specified OR it exists
    Ok(())
}

/// Removes duplicate entries while keeping the first occurrence of each
pub fn dedup_values(values: &mut Vec<String>) {
    *values = std::mem::take(values).into_iter().unique().collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_filenames() {
        assert!(check_required_filename(Path::new("test_data/trio.vcf"), "VCF").is_ok());
        assert!(check_required_filename(Path::new("test_data/missing.vcf"), "VCF").is_err());
        assert!(check_optional_filename(None, "BED").is_ok());
        assert!(check_optional_filename(Some(Path::new("test_data/missing.bed")), "BED").is_err());
    }

    #[test]
    fn test_dedup_values() {
        let mut values = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        dedup_values(&mut values);
        assert_eq!(values, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_after_help() {
        assert!(AFTER_HELP.contains("allele-beacon contributors"));
        assert!(AFTER_HELP.contains("MIT license"));
        assert!(!AFTER_HELP.contains("diagnostic"));
    }
}
