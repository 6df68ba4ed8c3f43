use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, dedup_values, AFTER_HELP, FULL_VERSION};
use crate::parsing::noodles_helper::sample_names;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct IngestSettings {
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

    /// Input variant call file (VCF)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub vcf_filename: PathBuf,

    /// Restrict ingestion to a gene panel or other regions (BED)
    #[clap(short = 'b')]
    #[clap(long = "regions")]
    #[clap(value_name = "BED")]
    #[clap(help_heading = Some("Input/Output"))]
    pub regions: Option<PathBuf>,

    /// Output rollup summary file (CSV/TSV)
    #[clap(long = "output-summary")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_summary_filename: Option<PathBuf>,

    /// The dataset receiving the calls
    #[clap(required = true)]
    #[clap(long = "dataset-id")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Ingestion"))]
    pub dataset_id: String,

    /// Sample to ingest, can be repeated [default: all samples in the VCF]
    #[clap(short = 's')]
    #[clap(long = "sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Ingestion"))]
    pub samples: Vec<String>,

    /// Genome build of the VCF [default: the dataset build]
    #[clap(long = "assembly")]
    #[clap(value_name = "BUILD")]
    #[clap(help_heading = Some("Ingestion"))]
    pub assembly_id: Option<String>,

    /// Number of threads to use for merging records
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_ingest_settings(mut settings: IngestSettings) -> anyhow::Result<IngestSettings> {
    // hard code the version in
    settings.beacon_version = FULL_VERSION.clone();
    info!("allele-beacon version: {:?}", &settings.beacon_version);
    info!("Sub-command: ingest");
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.db_filename, "Database")?;
    info!("\tDatabase: {:?}", &settings.db_filename);
    check_required_filename(&settings.vcf_filename, "Input VCF")?;
    info!("\tInput VCF: {:?}", &settings.vcf_filename);
    check_optional_filename(settings.regions.as_deref(), "Regions")?;
    if let Some(bed_fn) = settings.regions.as_deref() {
        info!("\tRegions: {bed_fn:?}");
    } else {
        info!("\tRegions: None");
    }

    // outputs
    info!("Outputs:");
    info!("\tSummary: {:?}", &settings.output_summary_filename);

    info!("Ingestion parameters:");
    ensure!(!settings.dataset_id.trim().is_empty(), "--dataset-id must not be empty");
    info!("\tDataset: {:?}", settings.dataset_id);
    if settings.samples.is_empty() {
        settings.samples = sample_names(&settings.vcf_filename)?;
        ensure!(!settings.samples.is_empty(), "No samples found in {:?}", settings.vcf_filename);
        info!("\tSamples: all {} in the VCF", settings.samples.len());
    } else {
        dedup_values(&mut settings.samples);
        info!("\tSamples: {:?}", settings.samples);
    }
    info!("\tAssembly: {}", settings.assembly_id.as_deref().unwrap_or("from dataset"));

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
