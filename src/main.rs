use log::{LevelFilter, error, info, warn};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use allele_beacon::beacon::{Beacon, BeaconConfig};
use allele_beacon::cli::core::{Commands, get_cli};
use allele_beacon::cli::dataset::{AddDatasetSettings, DatasetsSettings, check_add_dataset_settings, check_datasets_settings};
use allele_beacon::cli::delete::{DeleteSettings, check_delete_settings};
use allele_beacon::cli::ingest::{IngestSettings, check_ingest_settings};
use allele_beacon::cli::query::{QuerySettings, check_query_settings};
use allele_beacon::data_types::dataset::Dataset;
use allele_beacon::merge_engine::{IngestConfigBuilder, IngestError, check_samples};
use allele_beacon::parsing::region_filter::RegionFilter;
use allele_beacon::parsing::vcf_source::{VcfRecordSource, count_records};
use allele_beacon::store::memory::InMemoryStore;
use allele_beacon::util::json_io::save_json;
use allele_beacon::util::progress_bar::ingest_progress_bar;
use allele_beacon::writers::rollup_summary::RollupSummaryWriter;

/// Sets up logging before we check the other settings
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Loads the database or exits
fn load_beacon(db_filename: &Path) -> Beacon<InMemoryStore> {
    info!("Loading database from {db_filename:?}...");
    match InMemoryStore::load(db_filename) {
        Ok(store) => Beacon::new(BeaconConfig::default(), store),
        Err(e) => {
            error!("Error while loading database: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

/// Saves the database or exits
fn save_beacon(beacon: &Beacon<InMemoryStore>, db_filename: &Path) {
    info!("Saving database to {db_filename:?}...");
    if let Err(e) = beacon.store().save(db_filename) {
        error!("Error while saving database: {e:#}");
        std::process::exit(exitcode::IOERR);
    }
}

/// Writes the rollup of the given datasets, or all of them if `dataset_id` is None
fn write_rollup_summary(beacon: &Beacon<InMemoryStore>, dataset_id: Option<&str>, summary_fn: &Path) {
    use allele_beacon::store::VariantStore;

    let datasets = match beacon.store().list_datasets() {
        Ok(d) => d,
        Err(e) => {
            error!("Error while listing datasets: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let mut summary_writer = RollupSummaryWriter::default();
    for dataset in datasets.iter().filter(|d| dataset_id.is_none_or(|id| d.id() == id)) {
        summary_writer.add_dataset(dataset);
    }

    info!("Saving rollup summary to {summary_fn:?}...");
    if let Err(e) = summary_writer.write_summary(summary_fn) {
        error!("Error while saving summary file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }
}

fn run_add_dataset(settings: AddDatasetSettings) {
    init_logging(settings.verbosity);
    let settings = match check_add_dataset_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let store = match InMemoryStore::open_or_create(&settings.db_filename) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while opening database: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let beacon = Beacon::new(BeaconConfig::default(), store);

    let name = settings.name.as_deref().unwrap_or(&settings.dataset_id);
    let mut dataset = Dataset::new(&settings.dataset_id, name, Some(&settings.assembly_id), settings.access_level);
    if let Some(description) = settings.description.as_deref() {
        dataset = dataset.with_description(description);
    }
    if let Err(e) = beacon.add_dataset(dataset) {
        error!("Error while adding dataset: {e}");
        std::process::exit(exitcode::DATAERR);
    }

    save_beacon(&beacon, &settings.db_filename);
}

fn run_ingest(settings: IngestSettings) {
    // start the timer
    let start_time = Instant::now();

    init_logging(settings.verbosity);
    let settings = match check_ingest_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let beacon = load_beacon(&settings.db_filename);

    info!("Opening {:?}...", settings.vcf_filename);
    let mut record_source = match VcfRecordSource::from_path(&settings.vcf_filename) {
        Ok(rs) => rs,
        Err(e) => {
            error!("Error while opening VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    let samples: BTreeSet<String> = settings.samples.iter().cloned().collect();
    if let Err(e) = check_samples(&samples, record_source.sample_names()) {
        error!("Error while checking samples: {e}");
        std::process::exit(exitcode::CONFIG);
    }

    if let Some(bed_fn) = settings.regions.as_deref() {
        info!("Pre-loading regions into memory...");
        match RegionFilter::from_bed(bed_fn) {
            Ok(rf) => {
                record_source = record_source.with_region_filter(rf);
            },
            Err(e) => {
                error!("Error while loading regions: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        };
    }

    let mut config_builder = IngestConfigBuilder::default();
    config_builder
        .dataset_id(settings.dataset_id.clone())
        .samples(samples)
        .threads(settings.threads);
    if let Some(assembly_id) = settings.assembly_id.as_ref() {
        config_builder.assembly_id(assembly_id.clone());
    }
    let ingest_config = match config_builder.build() {
        Ok(ic) => ic,
        Err(e) => {
            error!("Error while building ingest config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    // the bar length is the number of VCF lines, multi-allelic lines may push it slightly past 100%
    let total_records = match count_records(&settings.vcf_filename) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("Could not count VCF records, progress is unbounded: {e:#}");
            None
        }
    };
    let progress_bar = ingest_progress_bar(total_records);

    // read errors stop the source; whatever was merged before that stays merged
    let read_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let records = record_source.map_while(|result| {
        match result {
            Ok(record) => Some(record),
            Err(e) => {
                *read_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                None
            }
        }
    });

    info!("Ingesting records...");
    let ingest_result = beacon.ingest(&ingest_config, records, Some(&progress_bar));
    progress_bar.finish();

    let summary = match ingest_result {
        Ok(s) => s,
        Err(IngestError::StoreUnavailable { source, summary }) => {
            error!("Store became unavailable after {} records: {source}", summary.records);
            std::process::exit(exitcode::IOERR);
        },
        Err(e) => {
            error!("Error while ingesting: {e}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Records: {}, written: {}, failed: {}", summary.records, summary.written(), summary.failed);

    save_beacon(&beacon, &settings.db_filename);
    if let Some(summary_fn) = settings.output_summary_filename.as_deref() {
        write_rollup_summary(&beacon, Some(&settings.dataset_id), summary_fn);
    }

    if let Some(e) = read_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
        error!("Error while reading VCF, ingestion is partial: {e:#}");
        std::process::exit(exitcode::DATAERR);
    }

    info!("Ingestion completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_delete(settings: DeleteSettings) {
    init_logging(settings.verbosity);
    let settings = match check_delete_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let beacon = load_beacon(&settings.db_filename);
    let samples: BTreeSet<String> = settings.samples.iter().cloned().collect();
    let summary = match beacon.delete_samples(&settings.dataset_id, &samples) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while deleting samples: {e}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Variants updated: {}, removed: {}, failed: {}", summary.updated, summary.removed, summary.failed);

    save_beacon(&beacon, &settings.db_filename);
    if let Some(summary_fn) = settings.output_summary_filename.as_deref() {
        write_rollup_summary(&beacon, Some(&settings.dataset_id), summary_fn);
    }
}

fn run_query(settings: QuerySettings) {
    init_logging(settings.verbosity);
    let settings = match check_query_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let request = match settings.build_request() {
        Ok(r) => r,
        Err(e) => {
            error!("Error while building request: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };

    let beacon = load_beacon(&settings.db_filename);
    let response = match beacon.query(&request, &settings.access_profile()) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while querying: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };

    if let Some(output_fn) = settings.output_filename.as_deref() {
        info!("Saving response to {output_fn:?}...");
        if let Err(e) = save_json(&response, output_fn) {
            error!("Error while saving response: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    } else {
        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Error while serializing response: {e}");
                std::process::exit(exitcode::SOFTWARE);
            }
        }
    }

    match (response.exists, response.error.as_ref()) {
        (_, Some(error)) => {
            warn!("Query rejected: {} ({})", error.error_name, error.error_message);
            std::process::exit(exitcode::DATAERR);
        },
        (exists, None) => info!("Allele exists: {}", exists.unwrap_or_default())
    };
}

fn run_datasets(settings: DatasetsSettings) {
    init_logging(settings.verbosity);
    let settings = match check_datasets_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let beacon = load_beacon(&settings.db_filename);
    let beacon_info = match beacon.info() {
        Ok(bi) => bi,
        Err(e) => {
            error!("Error while listing datasets: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    match serde_json::to_string_pretty(&beacon_info) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("Error while serializing datasets: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    }

    if let Some(summary_fn) = settings.output_summary_filename.as_deref() {
        write_rollup_summary(&beacon, None, summary_fn);
    }
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::AddDataset(settings) => {
            run_add_dataset(*settings);
        },
        Commands::Ingest(settings) => {
            run_ingest(*settings);
        },
        Commands::Delete(settings) => {
            run_delete(*settings);
        },
        Commands::Query(settings) => {
            run_query(*settings);
        },
        Commands::Datasets(settings) => {
            run_datasets(*settings);
        }
    }

    info!("Process finished successfully.");
}
