//! Fixed-size worker pool and the task values it runs.
//!
//! Tasks are plain values carrying everything they need; workers share
//! nothing mutable. Results come back in completion order and are put
//! back in submission order by index before the batch returns.

use super::metrics::{compute_stats, AggregatedStat, SampleSet, StatsOptions};
use crate::parser::decode_window;
use crate::parser::schema::{Cursor, Encoding, TraceWindow};
use crate::utils::error::{DecodeError, StatsError};
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::path::PathBuf;
use std::sync::mpsc;

/// Decode one run's records for one slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeTask {
    pub path: PathBuf,
    pub encoding: Encoding,
    /// Where the previous slice of this run stopped
    pub start: Cursor,
    /// Records wanted, `None` for everything left
    pub count: Option<u64>,
}

impl DecodeTask {
    pub fn run(&self) -> Result<TraceWindow, DecodeError> {
        decode_window(&self.path, self.encoding, self.start, self.count)
    }
}

/// Compute the statistics of one sample set
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTask {
    pub set: SampleSet,
    pub options: StatsOptions,
}

impl StatsTask {
    pub fn run(&self) -> Result<AggregatedStat, StatsError> {
        compute_stats(&self.set, &self.options)
    }
}

/// Worker pool shared by every slice and group of an invocation
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Start a pool of `workers` threads
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        debug!("Starting worker pool with {} threads", workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("veritrace-worker-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every task of a batch and wait for all of them.
    ///
    /// The returned vector is in task order: result `i` belongs to task `i`
    /// however long any single task took.
    pub fn run_batch<T, R, F>(&self, tasks: Vec<T>, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        let total = tasks.len();
        let (sender, receiver) = mpsc::channel();

        self.pool.install(|| {
            tasks
                .into_par_iter()
                .enumerate()
                .for_each_with(sender, |sender, (index, task)| {
                    // The receiver outlives the batch, so send cannot fail
                    let _ = sender.send((index, work(task)));
                });
        });

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (index, result) in receiver {
            slots[index] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_results_follow_task_order() {
        let pool = WorkerPool::new(4).unwrap();
        let tasks: Vec<u64> = (0..64).collect();

        // The first tasks finish last
        let results = pool.run_batch(tasks, |n| {
            if n < 4 {
                thread::sleep(Duration::from_millis(30));
            }
            n * 10
        });

        let expected: Vec<u64> = (0..64).map(|n| n * 10).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_pool_is_reusable() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.workers(), 2);
        for round in 0..3u32 {
            let out = pool.run_batch(vec![round; 5], |n| n + 1);
            assert_eq!(out, vec![round + 1; 5]);
        }
    }

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::new(1).unwrap();
        let out: Vec<u8> = pool.run_batch(Vec::<u8>::new(), |n| n);
        assert!(out.is_empty());
    }
}
