//! Grouping of run directories by call-site signature.
//!
//! Runs can only be aligned position by position when they went through
//! the same call sites, so every run directory is assigned to the group
//! of its backtrace descriptor's signature. Missing or unusable call-site
//! metadata stops the invocation rather than yielding a partial partition.

pub mod backtrace;

use crate::utils::error::PartitionError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use backtrace::{parse_descriptor, BacktraceDescriptor};

/// Run directories sharing one call-site signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacktraceGroup {
    pub signature: String,
    /// Sorted run directories whose trace file exists
    pub run_dirs: Vec<PathBuf>,
}

/// A run directory left out of the analysis, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedRun {
    pub dir: PathBuf,
    pub reason: String,
}

/// Result of partitioning a set of run directories
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Groups keyed by signature
    pub groups: BTreeMap<String, BacktraceGroup>,
    pub excluded: Vec<ExcludedRun>,
}

impl Partition {
    pub fn run_count(&self) -> usize {
        self.groups.values().map(|g| g.run_dirs.len()).sum()
    }
}

/// List the run directories under `prefix_dir`, sorted by path
pub fn list_run_dirs(prefix_dir: &Path) -> Result<Vec<PathBuf>, PartitionError> {
    let io_err = |source| PartitionError::Io {
        path: prefix_dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(prefix_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Partition run directories by backtrace signature
///
/// **Public** - main entry point for grouping
///
/// # Arguments
/// * `run_dirs` - Candidate run directories
/// * `trace_filename` - Name of the trace file inside each run directory
/// * `backtrace_filename` - Name of the descriptor inside each run directory
///
/// # Errors
/// * `PartitionError::NoRunDirectories` - Nothing to analyze
/// * `PartitionError::BacktraceFileNoExist` - A run has no descriptor
/// * `PartitionError::AllEmptyFile` - Every descriptor is zero length
/// * `PartitionError::InvalidDescriptor` - A descriptor cannot be parsed
pub fn partition_samples(
    run_dirs: &[PathBuf],
    trace_filename: &str,
    backtrace_filename: &str,
) -> Result<Partition, PartitionError> {
    if run_dirs.is_empty() {
        return Err(PartitionError::NoRunDirectories);
    }

    // Every run must carry a descriptor before anything is grouped
    let mut descriptors = Vec::with_capacity(run_dirs.len());
    for dir in run_dirs {
        let path = dir.join(backtrace_filename);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => return Err(PartitionError::BacktraceFileNoExist(path)),
        };
        descriptors.push((dir, path, metadata.len()));
    }

    if descriptors.iter().all(|(_, _, len)| *len == 0) {
        return Err(PartitionError::AllEmptyFile(backtrace_filename.to_string()));
    }

    let mut partition = Partition::default();

    for (dir, path, len) in descriptors {
        if len == 0 {
            warn!("Backtrace file {} is empty, skipping run", path.display());
            partition.excluded.push(ExcludedRun {
                dir: dir.clone(),
                reason: format!("{} is empty", backtrace_filename),
            });
            continue;
        }

        let content = fs::read_to_string(&path).map_err(|source| PartitionError::Io {
            path: path.clone(),
            source,
        })?;
        let descriptor = parse_descriptor(&content).map_err(|reason| {
            PartitionError::InvalidDescriptor {
                path: path.clone(),
                reason,
            }
        })?;
        let signature = descriptor.signature();

        if !dir.join(trace_filename).is_file() {
            debug!("No {} in {}, dropping run", trace_filename, dir.display());
            partition.excluded.push(ExcludedRun {
                dir: dir.clone(),
                reason: format!("{} does not exist", trace_filename),
            });
            continue;
        }

        debug!(
            "{} -> group {} ({} call sites)",
            dir.display(),
            signature,
            descriptor.len()
        );
        partition
            .groups
            .entry(signature.clone())
            .or_insert_with(|| BacktraceGroup {
                signature,
                run_dirs: Vec::new(),
            })
            .run_dirs
            .push(dir.clone());
    }

    for group in partition.groups.values_mut() {
        group.run_dirs.sort();
    }

    Ok(partition)
}
