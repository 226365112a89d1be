use crate::aggregator::StatsOptions;
use crate::parser::schema::Encoding;
use crate::utils::config::{
    DEFAULT_BACKTRACE_FILENAME, DEFAULT_OUTPUT_PREFIX, DEFAULT_PREFIX_DIR, DEFAULT_SDN_BASE,
    DEFAULT_TRACE_FILENAME, GIB, KIB, MIB,
};
use crate::utils::error::ConfigError;
use std::path::PathBuf;

/// Arguments for the analyze command, as typed by the user
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Directory holding one subdirectory per run
    pub prefix_dir: PathBuf,

    /// Trace filename inside each run directory
    pub trace_filename: String,

    /// Backtrace descriptor filename inside each run directory
    pub backtrace_filename: String,

    /// Output filename prefix, relative to `prefix_dir` unless absolute
    pub output_prefix: PathBuf,

    /// Bytes per slice, with optional K/M/G suffix; "0" for one slice
    pub read_per_bytes: String,

    /// Trace encoding ("binary" or "text")
    pub encoding: String,

    /// Reject misaligned sample sets
    pub data_checking: bool,

    /// Worker threads (None = host CPU count)
    pub workers: Option<usize>,

    /// Base of the significant digit number
    pub sdn_base: f64,

    /// Optional JSON report path
    pub report: Option<PathBuf>,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            prefix_dir: PathBuf::from(DEFAULT_PREFIX_DIR),
            trace_filename: DEFAULT_TRACE_FILENAME.to_string(),
            backtrace_filename: DEFAULT_BACKTRACE_FILENAME.to_string(),
            output_prefix: PathBuf::from(DEFAULT_OUTPUT_PREFIX),
            read_per_bytes: "0".to_string(),
            encoding: "binary".to_string(),
            data_checking: false,
            workers: None,
            sdn_base: DEFAULT_SDN_BASE,
            report: None,
        }
    }
}

/// Validated, immutable configuration of one analysis invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeConfig {
    pub prefix_dir: PathBuf,
    pub trace_filename: String,
    pub backtrace_filename: String,
    /// Already resolved against `prefix_dir`
    pub output_prefix: PathBuf,
    pub slice_bytes: u64,
    pub encoding: Encoding,
    pub stats: StatsOptions,
    pub workers: usize,
    pub report: Option<PathBuf>,
}

/// Validate analyze arguments into a configuration
///
/// **Public** - must succeed before any analysis starts
///
/// # Errors
/// * `ConfigError::MissingPrefixDir` - prefix directory does not exist
/// * `ConfigError::UnknownEncoding` - encoding is neither binary nor text
/// * `ConfigError::InvalidSliceSize` - slice size cannot be parsed
/// * `ConfigError::Invalid` - any other out-of-range value
pub fn validate_args(args: &AnalyzeArgs) -> Result<AnalyzeConfig, ConfigError> {
    if !args.prefix_dir.is_dir() {
        return Err(ConfigError::MissingPrefixDir(args.prefix_dir.clone()));
    }

    let encoding = args.encoding.parse::<Encoding>()?;
    let slice_bytes = parse_slice_size(&args.read_per_bytes)?;

    if args.trace_filename.is_empty() {
        return Err(ConfigError::Invalid("trace filename cannot be empty".to_string()));
    }
    if args.backtrace_filename.is_empty() {
        return Err(ConfigError::Invalid(
            "backtrace filename cannot be empty".to_string(),
        ));
    }
    if args.output_prefix.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("output prefix cannot be empty".to_string()));
    }

    if !(args.sdn_base.is_finite() && args.sdn_base > 1.0) {
        return Err(ConfigError::Invalid(format!(
            "sdn base must be greater than 1, got {}",
            args.sdn_base
        )));
    }

    let workers = match args.workers {
        Some(0) => {
            return Err(ConfigError::Invalid(
                "worker count must be greater than 0".to_string(),
            ))
        }
        Some(n) => n,
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    };

    let output_prefix = if args.output_prefix.is_absolute() {
        args.output_prefix.clone()
    } else {
        args.prefix_dir.join(&args.output_prefix)
    };

    Ok(AnalyzeConfig {
        prefix_dir: args.prefix_dir.clone(),
        trace_filename: args.trace_filename.clone(),
        backtrace_filename: args.backtrace_filename.clone(),
        output_prefix,
        slice_bytes,
        encoding,
        stats: StatsOptions {
            data_checking: args.data_checking,
            sdn_base: args.sdn_base,
        },
        workers,
        report: args.report.clone(),
    })
}

/// Parse a slice size such as `4096`, `64K`, `512M`, `2G` or `2Go`
///
/// Units are binary (K = 1024). `0` means a single slice.
pub fn parse_slice_size(value: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSliceSize(value.to_string());

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse::<u64>().map_err(|_| invalid());
    }

    let upper = trimmed.to_ascii_uppercase();
    let unit_part = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('O'))
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);

    let (digits, multiplier) = match unit_part.chars().last() {
        Some('K') => (&unit_part[..unit_part.len() - 1], KIB),
        Some('M') => (&unit_part[..unit_part.len() - 1], MIB),
        Some('G') => (&unit_part[..unit_part.len() - 1], GIB),
        _ => return Err(invalid()),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}
