
/// Decides which datasets a caller may see and drops hits from the rest
pub mod access_filter;
/// The top-level handle tying a store, its locks, and the engine together
pub mod beacon;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Content addressing for variants
pub mod identity;
/// Merges parsed variant records into the store and removes samples again
pub mod merge_engine;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Validates raw requests and turns them into match predicates
pub mod query_normalizer;
/// Builds the overall answer and the per-dataset responses
pub mod response_aggregator;
/// Derived per-dataset counters
pub mod rollup;
/// The store collaborator and its in-memory reference implementation
pub mod store;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
