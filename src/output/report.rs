//! Invocation report written by `--report`.
//!
//! Summarizes what every group produced and which runs were left out.

use crate::partition::ExcludedRun;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one backtrace group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Backtrace signature naming the group
    pub signature: String,

    /// Final CSV file, absent when the group failed or had no run left
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Runs that contributed to every slice
    pub runs: usize,

    pub slices: usize,

    /// Rows written (one per aligned program point)
    pub rows: u64,

    /// Runs dropped while the group was processed
    pub excluded: Vec<ExcludedRun>,

    /// Why the group produced no output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GroupReport {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            output: None,
            runs: 0,
            slices: 0,
            rows: 0,
            excluded: Vec::new(),
            error: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of a whole analysis invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub prefix_dir: PathBuf,
    pub encoding: String,
    pub slice_bytes: u64,
    pub workers: usize,
    pub groups: Vec<GroupReport>,
    /// Runs left out while partitioning
    pub excluded: Vec<ExcludedRun>,
    pub elapsed_secs: f64,
    /// ISO 8601 timestamp
    pub generated_at: String,
}

impl AnalysisReport {
    pub fn failed_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.failed()).count()
    }

    pub fn total_rows(&self) -> u64 {
        self.groups.iter().map(|g| g.rows).sum()
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Groups: {} | Failed: {} | Rows: {} | Excluded runs: {} | {:.2}s",
            self.groups.len(),
            self.failed_groups(),
            self.total_rows(),
            self.excluded.len()
                + self.groups.iter().map(|g| g.excluded.len()).sum::<usize>(),
            self.elapsed_secs
        )
    }
}
