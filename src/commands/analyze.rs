//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Partitions run directories by backtrace signature
//! 2. Starts the worker pool
//! 3. For every group, plans slices and aggregates them one at a time
//! 4. Concatenates each group's slice files into its final CSV
//! 5. Writes the optional JSON report

use super::models::AnalyzeConfig;
use crate::aggregator::{aggregate_slice, plan_slices, RunTrace, WorkerPool};
use crate::output::{
    concat_partial_files, partial_path, remove_partial_files, with_suffix, write_report,
    write_slice, AnalysisReport, GroupReport,
};
use crate::partition::{list_run_dirs, partition_samples, BacktraceGroup, ExcludedRun};
use crate::utils::error::{AnalyzeError, OutputError};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// A group whose output cannot be written is recorded as failed in the
/// report and the remaining groups still run. Every other error aborts.
///
/// # Errors
/// * Partition errors (missing or all-empty descriptors)
/// * Format errors in any trace
/// * Consistency errors when `data_checking` is on
pub fn execute_analyze(config: &AnalyzeConfig) -> Result<AnalysisReport, AnalyzeError> {
    let start_time = Instant::now();

    info!("Analyzing runs under: {}", config.prefix_dir.display());

    // Step 1: Partition run directories
    info!("Step 1/3: Partitioning run directories by backtrace...");
    let run_dirs = list_run_dirs(&config.prefix_dir)?;
    let partition = partition_samples(
        &run_dirs,
        &config.trace_filename,
        &config.backtrace_filename,
    )?;
    info!(
        "Found {} group(s) over {} run(s), {} excluded",
        partition.groups.len(),
        partition.run_count(),
        partition.excluded.len()
    );

    // Step 2: Start the worker pool once for the whole invocation
    info!("Step 2/3: Starting {} workers...", config.workers);
    let pool = WorkerPool::new(config.workers)?;

    // Step 3: Aggregate every group
    info!("Step 3/3: Aggregating groups...");
    let mut groups = Vec::with_capacity(partition.groups.len());
    for group in partition.groups.values() {
        debug!("Group {}: {:?}", group.signature, group.run_dirs);
        groups.push(analyze_group(&pool, config, group)?);
    }

    let report = AnalysisReport {
        prefix_dir: config.prefix_dir.clone(),
        encoding: config.encoding.to_string(),
        slice_bytes: config.slice_bytes,
        workers: pool.workers(),
        groups,
        excluded: partition.excluded,
        elapsed_secs: start_time.elapsed().as_secs_f64(),
        generated_at: Utc::now().to_rfc3339(),
    };

    if let Some(path) = &config.report {
        write_report(&report, path)?;
    }

    info!("Analysis completed: {}", report.summary());
    Ok(report)
}

/// Aggregate one group slice by slice
///
/// **Private** - internal helper for execute_analyze
fn analyze_group(
    pool: &WorkerPool,
    config: &AnalyzeConfig,
    group: &BacktraceGroup,
) -> Result<GroupReport, AnalyzeError> {
    let mut report = GroupReport::new(group.signature.clone());
    let (runs, sizes) = collect_traces(config, group, &mut report.excluded);

    if runs.is_empty() {
        warn!("Group {} has no readable trace, skipping", group.signature);
        report.error = Some("no readable trace".to_string());
        return Ok(report);
    }

    let plan = plan_slices(&group.signature, &sizes, config.encoding, config.slice_bytes)?;
    let output = with_suffix(&config.output_prefix, &group.signature);
    info!(
        "Group {}: {} run(s), {}{} slice(s) -> {}",
        group.signature,
        runs.len(),
        if plan.extends { "~" } else { "" },
        plan.len(),
        output.display()
    );

    let mut runs: Vec<RunTrace> = runs.into_iter().map(RunTrace::new).collect();
    let mut written = 0;
    while let Some(slice) = plan.slice(written) {
        let outcome = aggregate_slice(pool, &runs, config.encoding, &slice, &config.stats)?;
        runs = outcome.runs;
        report.excluded.extend(outcome.dropped);

        let partial = partial_path(&output, slice.index);
        written += 1;
        if let Err(e) = write_slice(&partial, &outcome.stats, slice.index == 0) {
            return Ok(fail_group(report, &output, written, e));
        }
        report.rows += outcome.stats.len() as u64;

        if runs.is_empty() {
            warn!("Group {}: every run was dropped", group.signature);
            remove_partial_files(&output, written);
            report.error = Some("every run was dropped".to_string());
            return Ok(report);
        }
        if plan.is_last(&slice, outcome.decoded) {
            break;
        }
    }

    if let Err(e) = concat_partial_files(&output, written) {
        return Ok(fail_group(report, &output, written, e));
    }

    report.runs = runs.len();
    report.slices = written;
    report.output = Some(output);
    Ok(report)
}

/// Trace paths and sizes of a group, leaving out unusable runs
///
/// **Private** - internal helper for analyze_group
fn collect_traces(
    config: &AnalyzeConfig,
    group: &BacktraceGroup,
    excluded: &mut Vec<ExcludedRun>,
) -> (Vec<PathBuf>, Vec<u64>) {
    let mut runs = Vec::with_capacity(group.run_dirs.len());
    let mut sizes = Vec::with_capacity(group.run_dirs.len());

    for dir in &group.run_dirs {
        let path = dir.join(&config.trace_filename);
        let reason = match fs::metadata(&path) {
            Ok(metadata) if metadata.len() > 0 => {
                runs.push(path);
                sizes.push(metadata.len());
                continue;
            }
            Ok(_) => format!("Trace file {} is empty", path.display()),
            Err(e) => format!("Could not open {}: {}", path.display(), e),
        };

        warn!("{}", reason);
        excluded.push(ExcludedRun {
            dir: dir.clone(),
            reason,
        });
    }

    (runs, sizes)
}

/// Record a group as failed and clean its partial files
///
/// **Private** - output failures only cost the group they happen in
fn fail_group(
    mut report: GroupReport,
    output: &Path,
    slices: usize,
    e: OutputError,
) -> GroupReport {
    error!("Group {}: cannot write {}: {}", report.signature, output.display(), e);
    remove_partial_files(output, slices);
    report.rows = 0;
    report.error = Some(e.to_string());
    report
}
