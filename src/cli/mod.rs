/*!
# CLI module
Command line interface functionality for running a beacon from a JSON database file.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The add-dataset and datasets CLI subcommands
pub mod dataset;
/// The delete CLI subcommand
pub mod delete;
/// The ingest CLI subcommand
pub mod ingest;
/// The query CLI subcommand
pub mod query;
