//! Command-line argument definitions for the scanlog processor
//!
//! This module defines the CLI interface using the clap derive API.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::constants::{DEFAULT_FILE_TEMPLATE, DEFAULT_SPECTRAL_LINE_CAPACITY, DEFAULT_START_SCAN};
use crate::error::{Result, ScanlogError};

/// CLI arguments for the scanlog processor
///
/// Incrementally parses beamline scan log files, tracking byte offsets so
/// re-parsing a growing file only processes new content.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scanlog-processor",
    version,
    about = "Parse beamline scan log files incrementally, with byte-offset resume",
    long_about = "Parses the line-oriented experiment log files written by the beamline \
                  data-acquisition system, one file per scan. Header metadata, motor \
                  positions, column schemas and spectral (MCA) payloads are extracted \
                  into scan records; byte offsets are tracked so files still being \
                  written by the producer can be re-parsed without duplicating scans."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the scanlog processor
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Discover and parse a series of scan log files (main command)
    Process(ProcessArgs),
    /// Parse a single scan log file and print its scan list
    Inspect(InspectArgs),
}

/// Output format for scan summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Text,
    /// JSON scan records
    Json,
}

/// Arguments for the process command (series discovery and parsing)
#[derive(Debug, Clone, Parser)]
pub struct ProcessArgs {
    /// Directory holding the per-scan log files
    #[arg(
        short = 'd',
        long = "directory",
        value_name = "PATH",
        help = "Directory holding the per-scan log files"
    )]
    pub directory: PathBuf,

    /// File name template; `{scan}` or `{scan:0N}` expands to the scan number
    #[arg(
        long,
        value_name = "TEMPLATE",
        default_value = DEFAULT_FILE_TEMPLATE,
        help = "File name template with a {scan} placeholder"
    )]
    pub template: String,

    /// First scan number to probe in sequential mode
    #[arg(
        long,
        value_name = "NUMBER",
        default_value_t = DEFAULT_START_SCAN,
        help = "First scan number to probe"
    )]
    pub start_scan: u32,

    /// Explicit comma-separated scan numbers instead of sequential probing
    #[arg(
        long,
        value_name = "NUMBERS",
        value_delimiter = ',',
        help = "Explicit comma-separated scan numbers"
    )]
    pub scans: Option<Vec<u32>>,

    /// Spectral (MCA) values per payload line
    #[arg(
        long = "mca-line-width",
        value_name = "N",
        default_value_t = DEFAULT_SPECTRAL_LINE_CAPACITY,
        help = "Spectral values per payload line"
    )]
    pub mca_line_width: usize,

    /// Treat files as finished: no tail re-exposure for growing data
    #[arg(long, help = "Producer has stopped writing; do not re-expose scan tails")]
    pub finished: bool,

    /// Materialize every scan's data table after parsing
    #[arg(long = "read-data", help = "Materialize data tables after parsing")]
    pub read_data: bool,

    /// Overwrite already-materialized downstream artifacts
    #[arg(long, help = "Overwrite downstream artifacts instead of reusing them")]
    pub overwrite: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl ProcessArgs {
    /// Log level derived from the verbosity switches
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Validate argument combinations before running
    pub fn validate(&self) -> Result<()> {
        if !self.directory.is_dir() {
            return Err(ScanlogError::Configuration {
                message: format!("'{}' is not a directory", self.directory.display()),
            });
        }
        if self.mca_line_width == 0 {
            return Err(ScanlogError::Configuration {
                message: "--mca-line-width must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Arguments for the inspect command (single file)
#[derive(Debug, Clone, Parser)]
pub struct InspectArgs {
    /// Scan log file to parse
    #[arg(value_name = "FILE", help = "Scan log file to parse")]
    pub file: PathBuf,

    /// Spectral (MCA) values per payload line
    #[arg(
        long = "mca-line-width",
        value_name = "N",
        default_value_t = DEFAULT_SPECTRAL_LINE_CAPACITY,
        help = "Spectral values per payload line"
    )]
    pub mca_line_width: usize,

    /// Materialize every scan's data table after parsing
    #[arg(long = "read-data", help = "Materialize data tables after parsing")]
    pub read_data: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl InspectArgs {
    /// Log level derived from the verbosity switches
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
