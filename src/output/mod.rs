//! Output writers for analysis results.
//!
//! This module handles writing data to disk:
//! - Per-slice CSV files and their concatenation
//! - JSON invocation reports

pub mod csv;
pub mod json;
pub mod report;

// Re-export main functions
pub use csv::{
    concat_partial_files, format_row, partial_path, remove_partial_files, validate_path,
    with_suffix, write_slice,
};
pub use json::{read_report, write_report};
pub use report::{AnalysisReport, GroupReport};
