//! Scan file parser.
//!
//! The state machine that consumes a byte stream from a file's resume
//! offset, drives line classification, accumulates per-scan header
//! metadata, detects record boundaries, and appends completed
//! [`ScanRecord`]s to the file's scan list. Owns all offset bookkeeping.
//!
//! The parser never materializes data rows; it only recognizes the boundary
//! between header and data and stores byte offsets. Actual table assembly
//! lives in [`data_reader`].

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::classify::{
    ClassifiedLine, LineClassifier, LineKind, SpecLineClassifier, extract_floats, extract_ints,
    split_column_names, split_motor_names, split_timestamp,
};
use crate::config::ParserConfig;
use crate::error::Result;
use crate::models::{ParsedFile, ScanRecord, ScanStatus, SpectralParams};

pub mod data_reader;

pub use data_reader::{AssemblyError, RowAssembler, ScanDataReader, TableBuilder};

#[cfg(test)]
mod tests;

/// Header fields accumulated for the scan currently being parsed.
///
/// The file-level motor defaults are snapshotted at scan start; scan-header
/// motor declarations accumulate separately and win over the snapshot when
/// present.
#[derive(Debug)]
struct PendingScan {
    number: u32,
    header_offset: u64,
    command: String,
    date: String,
    time: String,
    integration_time: f64,
    column_names: Vec<String>,
    file_motor_snapshot: Vec<String>,
    scan_motor_names: Vec<String>,
    motor_values: Vec<f64>,
    spectral_column: Option<usize>,
    spectral_channels: Option<(usize, u32, u32)>,
    status: ScanStatus,
    abort_pending: bool,
}

impl PendingScan {
    fn begin(number: u32, header_offset: u64, file_motor_names: &[String]) -> Self {
        Self {
            number,
            header_offset,
            command: String::new(),
            date: String::new(),
            time: String::new(),
            integration_time: f64::NAN,
            column_names: Vec::new(),
            file_motor_snapshot: file_motor_names.to_vec(),
            scan_motor_names: Vec::new(),
            motor_values: Vec::new(),
            spectral_column: None,
            spectral_channels: None,
            status: ScanStatus::Ok,
            abort_pending: false,
        }
    }

    fn into_record(self, data_offset: Option<u64>, status: ScanStatus, path: PathBuf) -> ScanRecord {
        let init_motor_names = if self.scan_motor_names.is_empty() {
            self.file_motor_snapshot
        } else {
            self.scan_motor_names
        };
        let spectral = match (self.spectral_column, self.spectral_channels) {
            (Some(column_index), Some((channel_count, start_channel, stop_channel))) => {
                Some(SpectralParams {
                    column_index,
                    channel_count,
                    start_channel,
                    stop_channel,
                })
            }
            (None, None) => None,
            _ => {
                warn!(
                    "scan {}: incomplete spectral declaration ignored",
                    self.number
                );
                None
            }
        };
        ScanRecord {
            number: self.number,
            command: self.command,
            date: self.date,
            time: self.time,
            integration_time: self.integration_time,
            column_names: self.column_names,
            header_offset: self.header_offset,
            data_offset,
            init_motor_names,
            init_motor_values: self.motor_values,
            spectral,
            status,
            path,
            header: Vec::new(),
            data: None,
        }
    }
}

/// Resumable parser for one scan log file.
///
/// Stateless between calls; all per-file state lives on the
/// [`ParsedFile`]. A single `ScanFileParser` may therefore serve many files,
/// but no two passes over the same `ParsedFile` may run concurrently.
#[derive(Debug, Clone)]
pub struct ScanFileParser<C = SpecLineClassifier> {
    classifier: C,
    config: ParserConfig,
}

impl ScanFileParser<SpecLineClassifier> {
    pub fn new(config: ParserConfig) -> Self {
        Self::with_classifier(SpecLineClassifier::new(), config)
    }
}

impl Default for ScanFileParser<SpecLineClassifier> {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl<C: LineClassifier> ScanFileParser<C> {
    /// Compose the parser with a custom line classifier
    pub fn with_classifier(classifier: C, config: ParserConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse the file from its resume offset, appending newly completed
    /// scans to its scan list. Returns the number of scans appended.
    ///
    /// A header block truncated by the end of stream is discarded, not
    /// appended; the next pass re-derives it from its header offset.
    pub fn parse(&self, file: &mut ParsedFile) -> Result<usize> {
        debug!(
            "parsing {} from offset {}",
            file.path().display(),
            file.last_offset()
        );

        let handle = std::fs::File::open(file.path())?;
        let mut reader = BufReader::new(handle);
        reader.seek(SeekFrom::Start(file.last_offset()))?;

        let path = file.path().to_path_buf();
        let mut offset = file.last_offset();
        let mut pending: Option<PendingScan> = None;
        let mut appended = 0usize;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let raw_len = reader.read_until(b'\n', &mut buf)?;
            if raw_len == 0 {
                break;
            }
            let line_start = offset;
            offset += raw_len as u64;

            let decoded = String::from_utf8_lossy(&buf);
            let line = decoded.trim();
            if line.is_empty() {
                continue;
            }
            let classified = self.classifier.classify(line);

            // An aborted scan consumes lines until it either resumes or the
            // block ends. Comments are swallowed; a second abort means the
            // scan is over with nothing written.
            if pending.as_ref().is_some_and(|p| p.abort_pending) {
                match classified.kind {
                    LineKind::Resume => {
                        if let Some(p) = pending.as_mut() {
                            p.abort_pending = false;
                            p.status = ScanStatus::Ok;
                        }
                        continue;
                    }
                    LineKind::Comment => continue,
                    LineKind::Abort => {
                        if let Some(p) = pending.take() {
                            appended += self.finalize(file, p, None, ScanStatus::NoData, &path);
                        }
                        continue;
                    }
                    _ => {
                        // end of the aborted block; the line itself is then
                        // handled from the idle state below
                        if let Some(p) = pending.take() {
                            appended += self.finalize(file, p, None, ScanStatus::Aborted, &path);
                        }
                    }
                }
            }

            match classified.kind {
                LineKind::NewFileHeader => {
                    // affects only scans started after this point
                    file.file_motor_names.clear();
                }
                LineKind::MotorNames => match pending.as_mut() {
                    Some(p) => p
                        .scan_motor_names
                        .extend(split_motor_names(classified.payload)),
                    None => file
                        .file_motor_names
                        .extend(split_motor_names(classified.payload)),
                },
                LineKind::ScanStart => {
                    let Some(number) = scan_number(&classified) else {
                        warn!("scan start marker without a readable number: {line}");
                        continue;
                    };
                    if let Some(p) = pending.take() {
                        // two consecutive scan headers: the first never
                        // produced data
                        appended += self.finalize(file, p, None, ScanStatus::NoData, &path);
                    }
                    debug!("scan {number} header starts at offset {line_start}");
                    pending = Some(PendingScan::begin(
                        number,
                        line_start,
                        &file.file_motor_names,
                    ));
                }
                LineKind::Data => {
                    // end of header: record where the data block starts and
                    // finalize; the rows themselves are read on demand
                    if let Some(p) = pending.take() {
                        let status = p.status;
                        appended += self.finalize(file, p, Some(line_start), status, &path);
                    }
                }
                LineKind::Abort => {
                    if let Some(p) = pending.as_mut() {
                        p.abort_pending = true;
                        p.status = ScanStatus::Aborted;
                    }
                }
                LineKind::Command => {
                    if let Some(p) = pending.as_mut() {
                        p.command = classified.payload.to_string();
                    }
                }
                LineKind::Timestamp => {
                    if let Some(p) = pending.as_mut() {
                        let (date, time) = split_timestamp(classified.payload);
                        p.date = date;
                        p.time = time;
                    }
                }
                LineKind::Exposure => {
                    if let Some(p) = pending.as_mut() {
                        match extract_floats(classified.payload).first() {
                            Some(value) => p.integration_time = *value,
                            None => {
                                warn!("scan {}: unreadable integration time", p.number);
                                p.status = ScanStatus::Corrupted;
                            }
                        }
                    }
                }
                LineKind::MotorValues => {
                    if let Some(p) = pending.as_mut() {
                        // malformed tokens are dropped; an empty position
                        // line must not abort header parsing
                        p.motor_values.extend(extract_floats(classified.payload));
                    }
                }
                LineKind::ColumnNames => {
                    if let Some(p) = pending.as_mut() {
                        p.column_names = split_column_names(classified.payload);
                    }
                }
                LineKind::SpectralFormat => {
                    if let Some(p) = pending.as_mut() {
                        match extract_ints(classified.payload).first() {
                            Some(column) => p.spectral_column = Some(*column as usize),
                            None => warn!("scan {}: unreadable spectral format", p.number),
                        }
                    }
                }
                LineKind::SpectralChannels => {
                    if let Some(p) = pending.as_mut() {
                        let ints = extract_ints(classified.payload);
                        if ints.len() >= 3 {
                            p.spectral_channels = Some((ints[0] as usize, ints[1], ints[2]));
                        } else {
                            warn!("scan {}: unreadable spectral channels", p.number);
                        }
                    }
                }
                LineKind::Resume
                | LineKind::Comment
                | LineKind::Header
                | LineKind::Unrecognized => {}
            }
        }

        // A header still open at end of stream is discarded; nothing was
        // appended for it, so re-deriving it next pass is idempotent.
        let discarded = pending.take().map(|p| {
            debug!(
                "scan {} header incomplete at end of stream, discarding",
                p.number
            );
            p.header_offset
        });

        let resume_at = if self.config.assume_growing {
            match file.scans().last() {
                // re-expose the tail of the most recent scan so data still
                // being appended is re-read in full next pass
                Some(last) => last.data_offset.unwrap_or(last.header_offset),
                None => discarded.unwrap_or(offset),
            }
        } else {
            discarded.unwrap_or(offset)
        };
        file.set_last_offset(resume_at);

        debug!(
            "pass complete: {} scans appended, resume offset {}",
            appended, resume_at
        );
        Ok(appended)
    }

    /// Re-parse a file that may have grown.
    ///
    /// The most recent scan is considered stale: it is removed and re-parsed
    /// from its header offset, so a scan whose data was incomplete on the
    /// previous pass is replaced rather than duplicated. Earlier scans are
    /// never touched.
    pub fn update(&self, file: &mut ParsedFile) -> Result<usize> {
        if let Some(stale) = file.pop_scan() {
            debug!(
                "re-parsing stale scan {} from offset {}",
                stale.number, stale.header_offset
            );
            file.set_last_offset(stale.header_offset);
        }
        self.parse(file)
    }

    fn finalize(
        &self,
        file: &mut ParsedFile,
        pending: PendingScan,
        data_offset: Option<u64>,
        status: ScanStatus,
        path: &std::path::Path,
    ) -> usize {
        let record = pending.into_record(data_offset, status, path.to_path_buf());
        debug!(
            "scan {} finalized as {} (header {}, data {:?})",
            record.number, record.status, record.header_offset, record.data_offset
        );
        file.push_scan(record);
        1
    }
}

/// The scan number is the marker's first whitespace-delimited field
fn scan_number(classified: &ClassifiedLine<'_>) -> Option<u32> {
    classified
        .payload
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
}
