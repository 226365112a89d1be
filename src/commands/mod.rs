//! CLI command implementations.
//!
//! Commands orchestrate the various library components to perform user tasks.

pub mod analyze;
pub mod models;

// Re-export main command functions
pub use analyze::execute_analyze;
pub use models::{parse_slice_size, validate_args, AnalyzeArgs, AnalyzeConfig};
