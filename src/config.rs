//! Configuration for parsing, data reading, and file discovery.
//!
//! Plain structs with builder-style `with_*` methods; the CLI maps its
//! arguments onto these. The spectral line capacity is a required input of
//! [`ReaderConfig`] because the log format itself never declares it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FILE_TEMPLATE, DEFAULT_START_SCAN};

/// Configuration of the scan file parser state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Whether the producer may still be appending to parsed files.
    ///
    /// When true (the default), a parse pass ends by re-exposing the tail of
    /// the most recent scan so its still-growing data block is re-read on
    /// the next pass. When false, `last_offset` advances to the true end of
    /// stream and repeated passes read nothing new.
    pub assume_growing: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            assume_growing: true,
        }
    }
}

impl ParserConfig {
    /// Mark parsed files as finished: no tail re-exposure at end of stream
    pub fn finished(mut self) -> Self {
        self.assume_growing = false;
        self
    }
}

/// Configuration of the scan data reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Spectral values per payload line.
    ///
    /// Determines how many consecutive lines one spectrum spans:
    /// `ceil(channel_count / spectral_line_capacity)`. Required because the
    /// file format never declares it.
    pub spectral_line_capacity: usize,
}

impl ReaderConfig {
    pub fn new(spectral_line_capacity: usize) -> Self {
        Self {
            spectral_line_capacity,
        }
    }
}

/// How candidate scan files are discovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMode {
    /// Probe increasing scan numbers starting at `start`, stop at the first
    /// missing file
    Sequential { start: u32 },
    /// Probe an ordered, explicit list of scan numbers, stop at the first
    /// missing file
    Explicit { numbers: Vec<u32> },
}

impl Default for DiscoveryMode {
    fn default() -> Self {
        DiscoveryMode::Sequential {
            start: DEFAULT_START_SCAN,
        }
    }
}

/// Configuration of scan file discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Directory holding the per-scan log files
    pub directory: PathBuf,

    /// File name template; `{scan}` or `{scan:0N}` expands to the scan
    /// number, zero-padded to N digits
    pub template: String,

    /// Discovery mode
    pub mode: DiscoveryMode,

    /// Overwrite-vs-reuse policy for already-materialized downstream
    /// artifacts. Carried for the persistence collaborator; the core never
    /// consults it.
    pub overwrite: bool,

    /// Parser configuration applied to every discovered file
    pub parser: ParserConfig,
}

impl DiscoveryConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            template: DEFAULT_FILE_TEMPLATE.to_string(),
            mode: DiscoveryMode::default(),
            overwrite: false,
            parser: ParserConfig::default(),
        }
    }

    /// Use a custom file name template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Probe sequentially from the given scan number
    pub fn with_start_scan(mut self, start: u32) -> Self {
        self.mode = DiscoveryMode::Sequential { start };
        self
    }

    /// Probe an explicit list of scan numbers
    pub fn with_scan_list(mut self, numbers: Vec<u32>) -> Self {
        self.mode = DiscoveryMode::Explicit { numbers };
        self
    }

    /// Overwrite already-materialized downstream artifacts
    pub fn with_overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Use a custom parser configuration
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }
}
