//! Configuration constants for the analyzer.

/// Size in bytes of one packed binary trace record
pub const BINARY_RECORD_BYTES: usize = 36;

/// Average width of one text trace line, used to estimate record counts.
///
/// Counting lines exactly would need a full scan of every trace, so text
/// slicing is approximate. The value matches the typical width of the
/// runtime's `%0.13a` output.
pub const TEXT_AVERAGE_LINE_BYTES: u64 = 80;

/// Lines starting with this marker are skipped in text traces
pub const TEXT_COMMENT_MARKER: char = '#';

// Default filenames, as written by the instrumentation runtime
pub const DEFAULT_TRACE_FILENAME: &str = "veritracer.dat";
pub const DEFAULT_BACKTRACE_FILENAME: &str = "backtrace.dat";
pub const DEFAULT_OUTPUT_PREFIX: &str = "veritracer";
pub const DEFAULT_PREFIX_DIR: &str = ".vtrace";

/// Column header of every result file
pub const CSV_HEADER: &[&str] = &[
    "hash",
    "type",
    "time",
    "max",
    "min",
    "median",
    "mean",
    "std",
    "significant_digit_number",
];

/// Default base for the significant digit number
pub const DEFAULT_SDN_BASE: f64 = 10.0;

// Mantissa widths used when every run agrees bit for bit.
// binary64 uses 52 (implicit bit excluded), binary32 uses 24.
pub const SDN_MAX_BITS_BINARY32: u32 = 24;
pub const SDN_MAX_BITS_BINARY64: u32 = 52;

// Slice size suffixes
pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * KIB;
pub const GIB: u64 = MIB * KIB;
