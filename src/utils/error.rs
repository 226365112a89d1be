//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs.
//!
//! The split between enums follows how far a failure reaches: a
//! [`DecodeError`] may only cost one run, a [`PartitionError`] or a
//! consistency failure stops the whole invocation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding one trace file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Trace file {0} is empty")]
    EmptyTrace(PathBuf),

    #[error("Invalid trace format in {path} (record {record}): {reason}")]
    Format {
        path: PathBuf,
        record: u64,
        reason: String,
    },
}

impl DecodeError {
    /// Whether the failure only affects coverage of one run.
    ///
    /// Missing and empty traces drop the run; a corrupt trace aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Io { .. } | DecodeError::EmptyTrace(_))
    }
}

/// Errors that can occur while grouping run directories by backtrace
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("No run directory to analyze")]
    NoRunDirectories,

    #[error("Backtrace file {0} does not exist")]
    BacktraceFileNoExist(PathBuf),

    #[error("All {0} files are empty")]
    AllEmptyFile(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid backtrace descriptor {path}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },
}

/// Errors that can occur while planning slices for a group
#[derive(Error, Debug)]
pub enum SliceError {
    #[error("Trace files in group {group} differ in size: {sizes:?}")]
    InconsistentTraceSize { group: String, sizes: Vec<u64> },

    #[error("Trace size {size} is not a multiple of the {record}-byte record")]
    TruncatedRecord { size: u64, record: usize },
}

/// Errors that can occur in the statistics engine
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Misaligned sample set at position {position}: {reason}")]
    Consistency { position: u64, reason: String },

    #[error("Empty sample set at position {0}")]
    EmptySampleSet(u64),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors in user-supplied configuration, reported before analysis starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown encoding: {0} (expected binary or text)")]
    UnknownEncoding(String),

    #[error("Unknown size: {0}")]
    InvalidSliceSize(String),

    #[error("Unknown directory {0}")]
    MissingPrefixDir(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that abort an analysis invocation
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Slice(#[from] SliceError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
