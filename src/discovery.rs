//! Scan file discovery.
//!
//! Maps scan numbers to on-disk log files via a naming template and drives
//! the parser over every resolved file. The acquisition system writes one
//! file per scan, so a missing file means "no more new data", not a
//! failure.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::classify::{LineClassifier, SpecLineClassifier};
use crate::config::{DiscoveryConfig, DiscoveryMode};
use crate::error::{Result, ScanlogError};
use crate::models::ParsedFile;
use crate::parser::ScanFileParser;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{scan(?::0(\d+))?\}").expect("valid regex"));

/// File name template with a `{scan}` or `{scan:0N}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    prefix: String,
    suffix: String,
    width: usize,
}

impl PathTemplate {
    /// Parse a template string, rejecting zero or multiple placeholders
    pub fn parse(template: &str) -> Result<Self> {
        let mut matches = PLACEHOLDER_RE.captures_iter(template);
        let captures = matches.next().ok_or_else(|| ScanlogError::InvalidTemplate {
            template: template.to_string(),
            reason: "missing {scan} placeholder".to_string(),
        })?;
        if matches.next().is_some() {
            return Err(ScanlogError::InvalidTemplate {
                template: template.to_string(),
                reason: "more than one {scan} placeholder".to_string(),
            });
        }
        let full = captures.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let width = captures
            .get(1)
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|e| ScanlogError::InvalidTemplate {
                template: template.to_string(),
                reason: e.to_string(),
            })?
            .unwrap_or(0);
        Ok(Self {
            prefix: template[..full.0].to_string(),
            suffix: template[full.1..].to_string(),
            width,
        })
    }

    /// Substitute a scan number, zero-padded to the declared width
    pub fn resolve(&self, number: u32) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            number,
            self.suffix,
            width = self.width
        )
    }
}

/// Discovers per-scan log files and parses each as an independent
/// [`ParsedFile`].
///
/// The probe cursor is series-level state: in sequential mode it advances
/// past each successfully parsed scan; in explicit-list mode it pins the
/// highest number probed so far so earlier numbers are never re-visited.
#[derive(Debug)]
pub struct ScanDiscovery<C = SpecLineClassifier> {
    directory: PathBuf,
    template: PathTemplate,
    mode: DiscoveryMode,
    cursor: u32,
    overwrite: bool,
    parser: ScanFileParser<C>,
}

impl ScanDiscovery<SpecLineClassifier> {
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        Self::with_classifier(SpecLineClassifier::new(), config)
    }
}

impl<C: LineClassifier> ScanDiscovery<C> {
    /// Compose discovery with a custom line classifier
    pub fn with_classifier(classifier: C, config: DiscoveryConfig) -> Result<Self> {
        let template = PathTemplate::parse(&config.template)?;
        let cursor = match &config.mode {
            DiscoveryMode::Sequential { start } => *start,
            DiscoveryMode::Explicit { numbers } => numbers.first().copied().unwrap_or(0),
        };
        Ok(Self {
            directory: config.directory,
            template,
            mode: config.mode,
            cursor,
            overwrite: config.overwrite,
            parser: ScanFileParser::with_classifier(classifier, config.parser),
        })
    }

    /// Next scan number to probe
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Overwrite-vs-reuse policy for the persistence collaborator
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// The parser applied to each discovered file; callers retaining a
    /// [`ParsedFile`] can drive incremental `update` passes through it
    pub fn parser(&self) -> &ScanFileParser<C> {
        &self.parser
    }

    /// Probe for scan files and parse every one that exists.
    ///
    /// Stops at the first missing file and reports the files parsed this
    /// pass. Each physical file is parsed once, in full, as an independent
    /// `ParsedFile`.
    pub fn poll(&mut self) -> Result<Vec<ParsedFile>> {
        let mut found = Vec::new();
        match self.mode.clone() {
            DiscoveryMode::Sequential { .. } => loop {
                let path = self.probe_path(self.cursor);
                if !path.exists() {
                    debug!("no file for scan {}; no more new data", self.cursor);
                    break;
                }
                found.push(self.parse_one(self.cursor, path)?);
                self.cursor += 1;
            },
            DiscoveryMode::Explicit { numbers } => {
                for number in numbers {
                    if number < self.cursor {
                        continue;
                    }
                    self.cursor = number;
                    let path = self.probe_path(number);
                    if !path.exists() {
                        debug!("no file for scan {number}; no more new data");
                        break;
                    }
                    found.push(self.parse_one(number, path)?);
                }
            }
        }
        Ok(found)
    }

    fn probe_path(&self, number: u32) -> PathBuf {
        self.directory.join(self.template.resolve(number))
    }

    fn parse_one(&self, number: u32, path: PathBuf) -> Result<ParsedFile> {
        info!("parsing scan {}: {}", number, path.display());
        let mut file = ParsedFile::new(path);
        self.parser.parse(&mut file)?;
        Ok(file)
    }
}

/// Check whether a path looks like a scan log file for the given template
pub fn matches_template(template: &PathTemplate, path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            name.strip_prefix(template.prefix.as_str())
                .and_then(|rest| rest.strip_suffix(template.suffix.as_str()))
                .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        })
}
