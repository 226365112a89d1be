//! Veritrace CLI
//!
//! Gathers the traces of several instrumented executions and reports
//! how many significant digits every observed value keeps across runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use veritrace_analyze::commands::{execute_analyze, validate_args, AnalyzeArgs};
use veritrace_analyze::utils::config::{
    DEFAULT_BACKTRACE_FILENAME, DEFAULT_OUTPUT_PREFIX, DEFAULT_PREFIX_DIR, DEFAULT_TRACE_FILENAME,
};

/// Veritrace - numerical stability analysis of instrumentation traces
#[derive(Parser, Debug)]
#[command(name = "veritrace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Gather values from several executions and compute statistics
    Analyze {
        /// Filename of the trace to gather in each run directory
        #[arg(long, default_value = DEFAULT_TRACE_FILENAME)]
        filename: String,

        /// Output filename prefix
        #[arg(short, long, default_value = DEFAULT_OUTPUT_PREFIX)]
        output: PathBuf,

        /// Read per packet of N bytes, with optional K, M, G suffix
        #[arg(long, default_value = "0")]
        read_per_bytes: String,

        /// Directory holding one subdirectory per run
        #[arg(long, default_value = DEFAULT_PREFIX_DIR)]
        prefix_dir: PathBuf,

        /// Filename of the backtrace descriptor in each run directory
        #[arg(long, default_value = DEFAULT_BACKTRACE_FILENAME)]
        backtrace_filename: String,

        /// Trace encoding (binary or text)
        #[arg(long, default_value = "binary")]
        format: String,

        /// Check that aligned values share hash and type
        #[arg(long)]
        data_checking: bool,

        /// Number of worker threads (defaults to the CPU count)
        #[arg(short = 'j', long, env = "VERITRACE_WORKERS")]
        jobs: Option<usize>,

        /// Base of the significant digit number
        #[arg(long, default_value = "10")]
        sdn_base: f64,

        /// Write a JSON summary of the invocation
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Analyze {
            filename,
            output,
            read_per_bytes,
            prefix_dir,
            backtrace_filename,
            format,
            data_checking,
            jobs,
            sdn_base,
            report,
        } => {
            let args = AnalyzeArgs {
                prefix_dir,
                trace_filename: filename,
                backtrace_filename,
                output_prefix: output,
                read_per_bytes,
                encoding: format,
                data_checking,
                workers: jobs,
                sdn_base,
                report,
            };

            // Validate args first
            let config = validate_args(&args).context("Invalid analyze arguments")?;

            let report = execute_analyze(&config).context("Analysis failed")?;

            let failed = report.failed_groups();
            if failed > 0 {
                anyhow::bail!("{} of {} group(s) failed", failed, report.groups.len());
            }
        }

        Commands::Version => {
            println!("Veritrace Analyze v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
