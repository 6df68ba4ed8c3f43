/// Helper functions for read/writing JSON via serde
pub mod json_io;
/// Per-key mutual exclusion for the merge and rollup critical sections
pub mod keyed_locks;
/// Helper functions for generating the progress bars
pub mod progress_bar;
