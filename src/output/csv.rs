//! CSV result writer.
//!
//! Every slice is written to its own partial file `<output>.<slice>`;
//! once a group is done the partial files are appended in slice order to
//! `<output>` and removed. Only slice 0 carries the header, so the final
//! file is identical whatever the number of slices.

use crate::aggregator::metrics::AggregatedStat;
use crate::utils::config::CSV_HEADER;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append `.<suffix>` to a path
pub fn with_suffix(path: &Path, suffix: impl std::fmt::Display) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", suffix));
    PathBuf::from(name)
}

/// Path of the partial file holding slice `slice` of `output`
pub fn partial_path(output: &Path, slice: usize) -> PathBuf {
    with_suffix(output, slice)
}

/// Header line of every result file
pub fn header_line() -> String {
    CSV_HEADER.join(",")
}

/// Format one statistic as a CSV row (no trailing newline)
pub fn format_row(stat: &AggregatedStat) -> String {
    format!(
        "{},{},{},{:?},{:?},{:?},{:?},{:?},{:?}",
        stat.hash,
        stat.size_tag,
        stat.time,
        stat.max,
        stat.min,
        stat.median,
        stat.mean,
        stat.std,
        stat.significant_digit_number
    )
}

/// Write the rows of one slice
///
/// **Public** - called once per slice by the coordinator
///
/// # Errors
/// * `OutputError::InvalidPath` - Path is empty or a directory
/// * `OutputError::WriteFailed` - File cannot be created or written
pub fn write_slice(
    path: &Path,
    stats: &[AggregatedStat],
    with_header: bool,
) -> Result<(), OutputError> {
    validate_path(path)?;
    debug!("Writing {} rows to {}", stats.len(), path.display());

    let mut writer = BufWriter::new(File::create(path)?);
    if with_header {
        writeln!(writer, "{}", header_line())?;
    }
    for stat in stats {
        writeln!(writer, "{}", format_row(stat))?;
    }
    writer.flush()?;
    Ok(())
}

/// Concatenate partial files `0..slices` into `output` and delete them
///
/// Returns the size of the final file in bytes.
pub fn concat_partial_files(output: &Path, slices: usize) -> Result<u64, OutputError> {
    validate_path(output)?;

    let mut writer = BufWriter::new(File::create(output)?);
    for slice in 0..slices {
        let partial = partial_path(output, slice);
        let mut reader = File::open(&partial)?;
        io::copy(&mut reader, &mut writer)?;
        drop(reader);
        fs::remove_file(&partial)?;
    }
    writer.flush()?;

    let size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    info!("Results written to {} ({} bytes)", output.display(), size);
    Ok(size)
}

/// Remove whatever partial files exist for `output`
///
/// Used when a group fails halfway; missing files are ignored.
pub fn remove_partial_files(output: &Path, slices: usize) {
    for slice in 0..slices {
        let partial = partial_path(output, slice);
        if partial.exists() {
            if let Err(e) = fs::remove_file(&partial) {
                debug!("Could not remove {}: {}", partial.display(), e);
            }
        }
    }
}

/// Validate that an output path is writable
pub fn validate_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}
