use anyhow::{bail, ensure, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::access::CallerAccessProfile;
use crate::data_types::allele_request::AlleleRequest;
use crate::util::json_io::load_json;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct QuerySettings {
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

    /// Request parameter as key=value, e.g. referenceName=1; can be repeated
    #[clap(short = 'p')]
    #[clap(long = "param")]
    #[clap(value_name = "KEY=VALUE")]
    #[clap(help_heading = Some("Request"))]
    pub params: Vec<String>,

    /// Request body as a JSON file, instead of --param
    #[clap(short = 'r')]
    #[clap(long = "request")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Request"))]
    #[clap(conflicts_with = "params")]
    pub request_filename: Option<PathBuf>,

    /// Output response file (JSON) [default: stdout]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: Option<PathBuf>,

    /// Dataset the caller is registered for, can be repeated
    #[clap(long = "registered")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Caller access"))]
    pub registered_datasets: Vec<String>,

    /// The caller holds controlled access
    #[clap(long = "controlled-access")]
    #[clap(help_heading = Some("Caller access"))]
    pub controlled_access: bool,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl QuerySettings {
    /// Builds the raw request from either the key/value params or the JSON file
    pub fn build_request(&self) -> anyhow::Result<AlleleRequest> {
        if let Some(request_fn) = self.request_filename.as_deref() {
            return load_json(request_fn)
                .with_context(|| format!("Error while parsing request from {request_fn:?}:"));
        }

        let pairs = self.params.iter()
            .map(|p| {
                match p.split_once('=') {
                    Some((key, value)) => Ok((key.trim(), value.trim())),
                    None => bail!("--param must be KEY=VALUE, found {p:?}")
                }
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(AlleleRequest::from_pairs(pairs))
    }

    /// The stand-in for the authorization collaborator
    pub fn access_profile(&self) -> CallerAccessProfile {
        let registered: BTreeSet<String> = self.registered_datasets.iter().cloned().collect();
        CallerAccessProfile::new(registered, self.controlled_access)
    }
}

pub fn check_query_settings(mut settings: QuerySettings) -> anyhow::Result<QuerySettings> {
    // hard code the version in
    settings.beacon_version = FULL_VERSION.clone();
    info!("allele-beacon version: {:?}", &settings.beacon_version);
    info!("Sub-command: query");

    check_required_filename(&settings.db_filename, "Database")?;
    info!("Database: {:?}", &settings.db_filename);
    check_optional_filename(settings.request_filename.as_deref(), "Request JSON")?;
    ensure!(
        settings.request_filename.is_some() || !settings.params.is_empty(),
        "Either --param or --request is required"
    );
    if let Some(request_fn) = settings.request_filename.as_deref() {
        info!("Request: {request_fn:?}");
    } else {
        info!("Request params: {:?}", settings.params);
    }
    info!("Output: {:?}", settings.output_filename.as_deref().unwrap_or(std::path::Path::new("stdout")));

    info!("Caller access:");
    info!("\tRegistered datasets: {:?}", settings.registered_datasets);
    info!("\tControlled access: {}", settings.controlled_access);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_from_params() {
        let settings = QuerySettings {
            params: vec![
                "referenceName=chr1".to_string(),
                "start = 100".to_string(),
                "datasetIds=ds1".to_string(),
                "datasetIds=ds2".to_string(),
            ],
            ..Default::default()
        };
        let request = settings.build_request().unwrap();
        assert_eq!(request.reference_name.as_deref(), Some("chr1"));
        assert_eq!(request.start.as_deref(), Some("100"));
        assert_eq!(request.dataset_ids, vec!["ds1".to_string(), "ds2".to_string()]);
    }

    #[test]
    fn test_bad_param() {
        let settings = QuerySettings {
            params: vec!["referenceName".to_string()],
            ..Default::default()
        };
        assert!(settings.build_request().is_err());
    }

    #[test]
    fn test_access_profile() {
        let settings = QuerySettings {
            registered_datasets: vec!["ds2".to_string()],
            controlled_access: true,
            ..Default::default()
        };
        let profile = settings.access_profile();
        assert!(profile.registered_dataset_ids().contains("ds2"));
        assert!(profile.has_controlled_access());
    }
}
