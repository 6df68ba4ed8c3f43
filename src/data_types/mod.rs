/// What an authenticated caller is allowed to see
pub mod access;
/// Raw, unvalidated allele requests
pub mod allele_request;
/// Datasets and their derived rollups
pub mod dataset;
/// Counters reported by ingestion and deletion
pub mod ingest_summary;
/// Canonical match predicates produced by query normalization
pub mod predicate;
/// Response payloads surfaced to callers
pub mod responses;
/// Contains variant definition functionality and checks
pub mod variants;
