//! Slice planning to bound memory per pass.
//!
//! A group's traces are cut into record ranges that are decoded,
//! aggregated and flushed one at a time. Resident memory is one slice
//! times the number of runs, whatever the total trace size.

use crate::parser::schema::{Encoding, RecordRange};
use crate::utils::config::{BINARY_RECORD_BYTES, TEXT_AVERAGE_LINE_BYTES};
use crate::utils::error::SliceError;
use log::debug;

/// One pass over a group's traces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub range: RecordRange,
}

/// Slices covering a group's traces, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePlan {
    pub slices: Vec<Slice>,
    /// Records per slice; the last slice takes whatever remains
    pub records_per_slice: u64,
    /// Exact for binary traces, estimated for text traces
    pub records: u64,
    /// Slices go on past `slices` until one comes back short.
    ///
    /// Set for sliced text traces, whose record count is only estimated.
    pub extends: bool,
}

impl SlicePlan {
    /// Planned slice count; a lower bound when the plan extends
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Slice `index`, past the planned ones when the plan extends
    pub fn slice(&self, index: usize) -> Option<Slice> {
        if let Some(slice) = self.slices.get(index) {
            return Some(*slice);
        }
        self.extends.then(|| Slice {
            index,
            range: RecordRange {
                first: index as u64 * self.records_per_slice,
                count: Some(self.records_per_slice),
            },
        })
    }

    /// Whether a slice that decoded at most `decoded` records per run was
    /// the last one
    pub fn is_last(&self, slice: &Slice, decoded: u64) -> bool {
        if self.extends {
            decoded < self.records_per_slice
        } else {
            slice.index + 1 >= self.slices.len()
        }
    }
}

/// Number of slices for `total_bytes` at `bytes_per_slice`.
///
/// `max(1, S / B)`, and a single slice when `B` is zero.
pub fn slice_count(total_bytes: u64, bytes_per_slice: u64) -> u64 {
    if bytes_per_slice == 0 {
        1
    } else {
        (total_bytes / bytes_per_slice).max(1)
    }
}

/// Plan the slices of one group
///
/// **Public** - called once per group before any decoding
///
/// # Arguments
/// * `group` - Group signature, for error messages
/// * `file_sizes` - Size in bytes of each run's trace
/// * `encoding` - Trace encoding
/// * `bytes_per_slice` - Target slice size, `0` for a single slice
///
/// # Errors
/// * `SliceError::InconsistentTraceSize` - binary traces of different sizes
/// * `SliceError::TruncatedRecord` - binary size not a multiple of the record
pub fn plan_slices(
    group: &str,
    file_sizes: &[u64],
    encoding: Encoding,
    bytes_per_slice: u64,
) -> Result<SlicePlan, SliceError> {
    let total_bytes = match encoding {
        Encoding::Binary => {
            let first = file_sizes.first().copied().unwrap_or(0);
            if file_sizes.iter().any(|size| *size != first) {
                return Err(SliceError::InconsistentTraceSize {
                    group: group.to_string(),
                    sizes: file_sizes.to_vec(),
                });
            }
            if first % BINARY_RECORD_BYTES as u64 != 0 {
                return Err(SliceError::TruncatedRecord {
                    size: first,
                    record: BINARY_RECORD_BYTES,
                });
            }
            first
        }
        // Text runs may differ in line width; the largest bounds the work
        Encoding::Text => file_sizes.iter().copied().max().unwrap_or(0),
    };

    let records = match encoding {
        Encoding::Binary => total_bytes / BINARY_RECORD_BYTES as u64,
        Encoding::Text => total_bytes / TEXT_AVERAGE_LINE_BYTES,
    };

    // Never plan more slices than records, so no slice is empty
    let wanted = slice_count(total_bytes, bytes_per_slice).min(records.max(1));
    let records_per_slice = records.div_ceil(wanted).max(1);
    let count = if records == 0 {
        1
    } else {
        records.div_ceil(records_per_slice)
    };

    // A text estimate can fall short, so text slices stay bounded and the
    // plan extends until the traces run out
    let extends = encoding == Encoding::Text && bytes_per_slice > 0;

    let slices = (0..count)
        .map(|index| Slice {
            index: index as usize,
            range: RecordRange {
                first: index * records_per_slice,
                count: if index + 1 == count && !extends {
                    None
                } else {
                    Some(records_per_slice)
                },
            },
        })
        .collect::<Vec<_>>();

    debug!(
        "Group {}: {} bytes, {} records, {} slice(s) of {} records",
        group,
        total_bytes,
        records,
        slices.len(),
        records_per_slice
    );

    Ok(SlicePlan {
        slices,
        records_per_slice,
        records,
        extends,
    })
}
