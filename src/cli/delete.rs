use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, dedup_values, AFTER_HELP, FULL_VERSION};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct DeleteSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    beacon_version: String,

    /// Database file (JSON, optionally gzipped)
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "db")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub db_filename: PathBuf,

    /// Output rollup summary file (CSV/TSV)
    #[clap(long = "output-summary")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_summary_filename: Option<PathBuf>,

    /// The dataset to remove samples from
    #[clap(required = true)]
    #[clap(long = "dataset-id")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Deletion"))]
    pub dataset_id: String,

    /// Sample to remove, can be repeated
    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Deletion"))]
    pub samples: Vec<String>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_delete_settings(mut settings: DeleteSettings) -> anyhow::Result<DeleteSettings> {
    // hard code the version in
    settings.beacon_version = FULL_VERSION.clone();
    info!("allele-beacon version: {:?}", &settings.beacon_version);
    info!("Sub-command: delete");

    check_required_filename(&settings.db_filename, "Database")?;
    info!("Database: {:?}", &settings.db_filename);
    info!("Summary: {:?}", &settings.output_summary_filename);

    info!("Deletion parameters:");
    ensure!(!settings.dataset_id.trim().is_empty(), "--dataset-id must not be empty");
    info!("\tDataset: {:?}", settings.dataset_id);
    dedup_values(&mut settings.samples);
    ensure!(!settings.samples.is_empty(), "At least one --sample is required");
    info!("\tSamples: {:?}", settings.samples);

    Ok(settings)
}
