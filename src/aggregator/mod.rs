//! Cross-run alignment and parallel aggregation.
//!
//! This module turns the traces of one backtrace group into statistics:
//! - Slice planning (bounded memory per pass)
//! - Parallel decoding of every run for a slice
//! - Transposition into cross-run sample sets
//! - Parallel statistics, returned in sequence order

pub mod metrics;
pub mod pool;
pub mod slice;

use crate::parser::schema::{Cursor, Encoding, Observation};
use crate::partition::ExcludedRun;
use crate::utils::error::AnalyzeError;
use log::{debug, warn};
use std::path::PathBuf;

// Re-export main types and functions
pub use metrics::{compute_stats, significant_digit_number, AggregatedStat, SampleSet, StatsOptions};
pub use pool::{DecodeTask, StatsTask, WorkerPool};
pub use slice::{plan_slices, slice_count, Slice, SlicePlan};

/// One run's trace and how far it has been read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTrace {
    pub path: PathBuf,
    pub cursor: Cursor,
}

impl RunTrace {
    /// A trace not read yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: Cursor::START,
        }
    }
}

/// Statistics of one slice and the runs that could not contribute
#[derive(Debug, Clone, Default)]
pub struct SliceOutcome {
    /// One entry per sequence position, in order
    pub stats: Vec<AggregatedStat>,
    /// Runs whose trace became unreadable
    pub dropped: Vec<ExcludedRun>,
    /// Remaining runs, moved past this slice
    pub runs: Vec<RunTrace>,
    /// Most records any run yielded for this slice
    pub decoded: u64,
}

/// Decode and aggregate one slice of a group
///
/// **Public** - called by the coordinator for every slice
///
/// Each run is read from its cursor on, so a group is read once in total
/// whatever the number of slices.
///
/// # Arguments
/// * `pool` - Worker pool shared by the invocation
/// * `runs` - Trace file of each contributing run, with its cursor
/// * `encoding` - Trace encoding
/// * `slice` - Record range to process
/// * `options` - Statistics options
///
/// # Errors
/// Any non-recoverable decode error, and any statistics error.
pub fn aggregate_slice(
    pool: &WorkerPool,
    runs: &[RunTrace],
    encoding: Encoding,
    slice: &Slice,
    options: &StatsOptions,
) -> Result<SliceOutcome, AnalyzeError> {
    let tasks: Vec<DecodeTask> = runs
        .iter()
        .map(|run| DecodeTask {
            path: run.path.clone(),
            encoding,
            start: run.cursor,
            count: slice.range.count,
        })
        .collect();

    debug!("Slice {}: decoding {} runs", slice.index, tasks.len());
    let decoded = pool.run_batch(tasks, |task| task.run());

    let mut sequences = Vec::with_capacity(decoded.len());
    let mut advanced = Vec::with_capacity(decoded.len());
    let mut dropped = Vec::new();
    for (run, result) in runs.iter().zip(decoded) {
        match result {
            Ok(window) => {
                sequences.push(window.observations);
                advanced.push(RunTrace {
                    path: run.path.clone(),
                    cursor: window.next,
                });
            }
            Err(e) if e.is_recoverable() => {
                warn!("{}", e);
                dropped.push(ExcludedRun {
                    dir: run.path.parent().map(PathBuf::from).unwrap_or_default(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    let most = sequences.iter().map(Vec::len).max().unwrap_or(0) as u64;
    let sets = transpose(sequences, slice.range.first);

    debug!("Slice {}: computing {} sample sets", slice.index, sets.len());
    let tasks: Vec<StatsTask> = sets
        .into_iter()
        .map(|set| StatsTask {
            set,
            options: *options,
        })
        .collect();
    let stats = pool
        .run_batch(tasks, |task| task.run())
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SliceOutcome {
        stats,
        dropped,
        runs: advanced,
        decoded: most,
    })
}

/// Turn per-run sequences into per-position sample sets.
///
/// Runs are cut to the shortest sequence; positions start at `first`.
pub fn transpose(sequences: Vec<Vec<Observation>>, first: u64) -> Vec<SampleSet> {
    let Some(shortest) = sequences.iter().map(Vec::len).min() else {
        return Vec::new();
    };
    let longest = sequences.iter().map(Vec::len).max().unwrap_or(shortest);
    if longest != shortest {
        warn!(
            "Runs disagree on record count ({} to {}), keeping the first {}",
            shortest, longest, shortest
        );
    }

    let mut columns: Vec<_> = sequences.into_iter().map(Vec::into_iter).collect();
    (0..shortest)
        .map(|offset| SampleSet {
            position: first + offset as u64,
            observations: columns.iter_mut().filter_map(Iterator::next).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{Address, SizeTag};

    fn run(values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation::new(SizeTag::Binary64, i as u64, Address::NULL, i as u64, *v))
            .collect()
    }

    #[test]
    fn test_transpose() {
        let sets = transpose(vec![run(&[1.0, 2.0]), run(&[3.0, 4.0]), run(&[5.0, 6.0])], 10);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].position, 10);
        let column: Vec<f64> = sets[1].observations.iter().map(|o| o.value).collect();
        assert_eq!(column, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_transpose_truncates_to_shortest() {
        let sets = transpose(vec![run(&[1.0, 2.0, 3.0]), run(&[1.0])], 0);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].observations.len(), 2);
    }

    #[test]
    fn test_transpose_no_runs() {
        assert!(transpose(Vec::new(), 0).is_empty());
    }
}
