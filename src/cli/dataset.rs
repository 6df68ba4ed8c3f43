use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::dataset::AccessLevel;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct AddDatasetSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    beacon_version: String,

    /// Database file (JSON, optionally gzipped); created if missing
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "db")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub db_filename: PathBuf,

    /// Unique dataset identifier
    #[clap(required = true)]
    #[clap(long = "dataset-id")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Dataset"))]
    pub dataset_id: String,

    /// Display name [default: the dataset identifier]
    #[clap(long = "name")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Dataset"))]
    pub name: Option<String>,

    /// Genome build of the dataset, e.g. GRCh38
    #[clap(required = true)]
    #[clap(long = "assembly")]
    #[clap(value_name = "BUILD")]
    #[clap(help_heading = Some("Dataset"))]
    pub assembly_id: String,

    /// Who may see the calls of this dataset
    #[clap(long = "access-level")]
    #[clap(value_name = "LEVEL")]
    #[clap(help_heading = Some("Dataset"))]
    #[clap(default_value = "public")]
    pub access_level: AccessLevel,

    /// Free-text description
    #[clap(long = "description")]
    #[clap(value_name = "TEXT")]
    #[clap(help_heading = Some("Dataset"))]
    pub description: Option<String>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_add_dataset_settings(mut settings: AddDatasetSettings) -> anyhow::Result<AddDatasetSettings> {
    // hard code the version in
    settings.beacon_version = FULL_VERSION.clone();
    info!("allele-beacon version: {:?}", &settings.beacon_version);
    info!("Sub-command: add-dataset");
    info!("Database: {:?}", &settings.db_filename);

    ensure!(!settings.dataset_id.trim().is_empty(), "--dataset-id must not be empty");
    ensure!(!settings.assembly_id.trim().is_empty(), "--assembly must not be empty");
    if settings.name.is_none() {
        settings.name = Some(settings.dataset_id.clone());
    }

    info!("Dataset:");
    info!("\tID: {:?}", settings.dataset_id);
    info!("\tName: {:?}", settings.name.as_deref().unwrap_or_default());
    info!("\tAssembly: {:?}", settings.assembly_id);
    info!("\tAccess level: {}", settings.access_level);
    info!("\tDescription: {:?}", settings.description);

    Ok(settings)
}

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct DatasetsSettings {
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

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_datasets_settings(mut settings: DatasetsSettings) -> anyhow::Result<DatasetsSettings> {
    // hard code the version in
    settings.beacon_version = FULL_VERSION.clone();
    info!("allele-beacon version: {:?}", &settings.beacon_version);
    info!("Sub-command: datasets");

    check_required_filename(&settings.db_filename, "Database")?;
    info!("Database: {:?}", &settings.db_filename);
    info!("Summary: {:?}", &settings.output_summary_filename);

    Ok(settings)
}
