//! Veritrace Analyze
//!
//! Cross-run numerical stability analysis for floating-point
//! instrumentation traces.
//!
//! Many executions of an instrumented program each leave a trace of the
//! values observed at every program point. This crate aligns the traces position
//! by position, computes per-point statistics (extrema, mean, standard
//! deviation, significant digits) and writes them as CSV, one file per
//! backtrace group.
//!
//! ## Getting Started
//!
//! ```bash
//! cargo install veritrace-analyze
//! veritrace analyze --prefix-dir .vtrace --read-per-bytes 512M
//! ```

pub mod aggregator;
pub mod commands;
pub mod output;
pub mod parser;
pub mod partition;
pub mod utils;
