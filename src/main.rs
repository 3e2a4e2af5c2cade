use clap::Parser;
use scanlog_processor::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(()) => {
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {:#}", anyhow::Error::new(error));
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Scanlog Processor - Beamline Scan Log Parser");
    println!("============================================");
    println!();
    println!("Parse the per-scan log files written by the beamline data-acquisition");
    println!("system, including files the producer is still appending to.");
    println!();
    println!("USAGE:");
    println!("    scanlog-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    process     Discover and parse a series of scan log files (main command)");
    println!("    inspect     Parse a single scan log file and print its scan list");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Parse every scan file in a run directory, starting at scan 1:");
    println!("    scanlog-processor process --directory /data/run42");
    println!();
    println!("    # Parse an explicit list of scans and materialize their tables:");
    println!("    scanlog-processor process --directory /data/run42 \\");
    println!("                              --scans 3,5,9 --read-data");
    println!();
    println!("    # Inspect a single log file as JSON:");
    println!("    scanlog-processor inspect /data/run42/0000003_meta.log --format json");
    println!();
    println!("For detailed help on any command, use:");
    println!("    scanlog-processor <COMMAND> --help");
}
