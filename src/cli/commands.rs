//! Command implementations for the scanlog processor CLI
//!
//! Contains the command execution logic, logging setup, and scan summary
//! reporting in text or JSON form.

use std::path::Path;

use colored::Colorize;
use indicatif::ProgressBar;
use serde_json::json;
use tracing::{debug, info};

use crate::cli::args::{Args, Commands, InspectArgs, OutputFormat, ProcessArgs};
use crate::config::{DiscoveryConfig, ParserConfig, ReaderConfig};
use crate::discovery::{PathTemplate, ScanDiscovery, matches_template};
use crate::error::{Result, ScanlogError};
use crate::models::{ParsedFile, ScanStatus};
use crate::parser::{ScanDataReader, ScanFileParser};

/// Dispatch the parsed CLI arguments to the selected command
pub fn run(args: Args) -> Result<()> {
    match args.command {
        Some(Commands::Process(process_args)) => process(process_args),
        Some(Commands::Inspect(inspect_args)) => inspect(inspect_args),
        None => Ok(()),
    }
}

/// Set up structured logging to stderr
fn setup_logging(log_level: &str, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scanlog_processor={log_level}")));

    if quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {log_level}");
}

/// Discover and parse a scan series
fn process(args: ProcessArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet);
    args.validate()?;

    let parser_config = if args.finished {
        ParserConfig::default().finished()
    } else {
        ParserConfig::default()
    };
    let mut config = DiscoveryConfig::new(&args.directory)
        .with_template(&args.template)
        .with_parser(parser_config);
    config = match &args.scans {
        Some(numbers) => config.with_scan_list(numbers.clone()),
        None => config.with_start_scan(args.start_scan),
    };
    if args.overwrite {
        config = config.with_overwrite();
    }

    let template = PathTemplate::parse(&args.template)?;
    let candidates = count_candidates(&args.directory, &template)?;
    info!(
        "{} candidate scan files in {}",
        candidates,
        args.directory.display()
    );

    let mut discovery = ScanDiscovery::new(config)?;
    let mut files = discovery.poll()?;
    info!(
        "parsed {} scan files, cursor at scan {}",
        files.len(),
        discovery.cursor()
    );

    if args.read_data {
        read_all_tables(&mut files, args.mca_line_width)?;
    }
    report(&files, args.format)
}

/// Parse one scan log file and print its scan list
fn inspect(args: InspectArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet);

    if !args.file.is_file() {
        return Err(ScanlogError::FileNotFound {
            path: args.file.clone(),
        });
    }

    // a single inspection is one full pass; no tail re-exposure needed
    let parser = ScanFileParser::new(ParserConfig::default().finished());
    let mut file = ParsedFile::new(&args.file);
    parser.parse(&mut file)?;

    let mut files = vec![file];
    if args.read_data {
        read_all_tables(&mut files, args.mca_line_width)?;
    }
    report(&files, args.format)
}

/// Count directory entries that match the file name template
fn count_candidates(directory: &Path, template: &PathTemplate) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if matches_template(template, &entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Materialize every scan's data table, with a progress bar
fn read_all_tables(files: &mut [ParsedFile], line_capacity: usize) -> Result<()> {
    let reader = ScanDataReader::new(ReaderConfig::new(line_capacity));
    let total: usize = files.iter().map(|f| f.scans().len()).sum();
    let progress = ProgressBar::new(total as u64);

    for file in files.iter_mut() {
        for scan in file.scans_mut() {
            reader.read(scan)?;
            progress.inc(1);
        }
    }
    progress.finish_and_clear();
    Ok(())
}

/// Print the scan summary in the requested format
fn report(files: &[ParsedFile], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => report_text(files),
        OutputFormat::Json => report_json(files),
    }
}

fn report_text(files: &[ParsedFile]) -> Result<()> {
    let mut totals = [0usize; 4];

    for file in files {
        println!("{}", file.path().display().to_string().bold());
        for scan in file.scans() {
            let rows = scan
                .data()
                .map(|d| format!("{} rows", d.len()))
                .unwrap_or_default();
            println!(
                "  {:<10} {:<9} {:<32} {}",
                scan.name(),
                status_label(scan.status),
                scan.command,
                rows
            );
            totals[status_index(scan.status)] += 1;
        }
    }

    let total: usize = totals.iter().sum();
    println!(
        "\n{} scans: {} OK, {} NODATA, {} ABORTED, {} CORRUPTED",
        total, totals[0], totals[1], totals[2], totals[3]
    );
    Ok(())
}

fn report_json(files: &[ParsedFile]) -> Result<()> {
    let value: Vec<_> = files
        .iter()
        .map(|file| {
            json!({
                "path": file.path(),
                "last_offset": file.last_offset(),
                "scans": file.scans(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn status_label(status: ScanStatus) -> colored::ColoredString {
    match status {
        ScanStatus::Ok => status.as_str().green(),
        ScanStatus::NoData => status.as_str().yellow(),
        ScanStatus::Aborted | ScanStatus::Corrupted => status.as_str().red(),
    }
}

fn status_index(status: ScanStatus) -> usize {
    match status {
        ScanStatus::Ok => 0,
        ScanStatus::NoData => 1,
        ScanStatus::Aborted => 2,
        ScanStatus::Corrupted => 3,
    }
}
