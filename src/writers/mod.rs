/*!
# Writers module
Contains the logic for writing the report files of the CLI commands.
*/
/// Generates the per-dataset rollup summary file
pub mod rollup_summary;
