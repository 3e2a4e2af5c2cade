//! Tests for the scan file parser and data reader.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::ParserConfig;
use crate::models::ParsedFile;
use crate::parser::ScanFileParser;

mod parser_tests;

/// Write `content` as a scan log file inside `dir` and return its path
fn write_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Append more content to an existing log file, as the producer would
fn append_log(path: &PathBuf, content: &str) {
    use std::io::Write;
    let mut handle = fs::OpenOptions::new().append(true).open(path).unwrap();
    handle.write_all(content.as_bytes()).unwrap();
}

/// Parse a fresh file with the default (growing) configuration
fn parse_fresh(path: &PathBuf) -> ParsedFile {
    let parser = ScanFileParser::new(ParserConfig::default());
    let mut file = ParsedFile::new(path.clone());
    parser.parse(&mut file).unwrap();
    file
}
