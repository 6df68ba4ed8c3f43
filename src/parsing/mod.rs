/*!
# Parsing module
Contains the logic for parsing input files into variant records ready for ingestion.
*/
/// Helper functions for noodles
pub mod noodles_helper;
/// BED-backed panel restriction with interval tree lookups
pub mod region_filter;
/// Splits VCF lines into one raw record per ALT allele
pub mod vcf_source;
