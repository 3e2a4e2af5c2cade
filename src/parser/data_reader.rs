//! Scan data materialization.
//!
//! Given a finalized scan with a valid data offset, re-opens the owning
//! file, seeks to the data block, and assembles the full row table. Rows
//! mix scalar counters with an optional fixed-length spectrum spread over
//! several consecutive payload lines. A shape failure demotes the whole
//! scan to `NODATA`; a partially filled table is never returned.

use std::io::{BufRead, BufReader, Seek, SeekFrom};

use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{LineClassifier, LineKind, SpecLineClassifier, extract_floats, extract_ints};
use crate::config::ReaderConfig;
use crate::constants::SPECTRAL_COLUMN_NAME;
use crate::error::Result;
use crate::models::{DataTable, ScanRecord, ScanStatus, SpectralParams};

/// Row assembly failure; demotes the whole scan to `NODATA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("expected {expected} fields per row, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("spectrum has {found} channels, expected {expected}")]
    ChannelCount { expected: usize, found: usize },
}

/// Capability interface for row assembly.
///
/// The data reader feeds raw data lines in file order; the assembler
/// decides whether a line is a scalar row or the continuation of a spectral
/// block, and enforces the declared schema.
pub trait RowAssembler {
    /// Feed one data line
    fn push_line(&mut self, line: &str) -> std::result::Result<(), AssemblyError>;

    /// Finish assembly. An incomplete trailing spectral block is dropped,
    /// matching a producer that was interrupted mid-row.
    fn into_table(self) -> DataTable
    where
        Self: Sized;
}

/// Default assembler building a [`DataTable`] against a declared schema
#[derive(Debug)]
pub struct TableBuilder {
    table: DataTable,
    arity: usize,
    channel_count: usize,
    lines_per_block: usize,
    pending_scalars: Option<Vec<f64>>,
    pending_spectrum: Vec<u32>,
    spectral_lines_seen: usize,
}

impl TableBuilder {
    pub fn new(
        columns: &[String],
        spectral: Option<&SpectralParams>,
        line_capacity: usize,
    ) -> Self {
        let lines_per_block = spectral
            .map(|s| s.channel_count.div_ceil(line_capacity.max(1)).max(1))
            .unwrap_or(0);
        Self {
            table: DataTable::new(
                columns.to_vec(),
                spectral.map(|_| SPECTRAL_COLUMN_NAME.to_string()),
            ),
            arity: columns.len(),
            channel_count: spectral.map(|s| s.channel_count).unwrap_or(0),
            lines_per_block,
            pending_scalars: None,
            pending_spectrum: Vec::new(),
            spectral_lines_seen: 0,
        }
    }

    fn has_spectral(&self) -> bool {
        self.lines_per_block > 0
    }
}

impl RowAssembler for TableBuilder {
    fn push_line(&mut self, line: &str) -> std::result::Result<(), AssemblyError> {
        if let Some(scalars) = self.pending_scalars.take() {
            // inside a spectral block
            self.pending_spectrum.extend(extract_ints(line));
            self.spectral_lines_seen += 1;
            if self.spectral_lines_seen < self.lines_per_block {
                self.pending_scalars = Some(scalars);
                return Ok(());
            }
            let spectrum = std::mem::take(&mut self.pending_spectrum);
            self.spectral_lines_seen = 0;
            if spectrum.len() != self.channel_count {
                return Err(AssemblyError::ChannelCount {
                    expected: self.channel_count,
                    found: spectrum.len(),
                });
            }
            self.table.push_row(scalars, Some(spectrum));
            return Ok(());
        }

        let scalars = extract_floats(line);
        if scalars.len() != self.arity {
            return Err(AssemblyError::FieldCount {
                expected: self.arity,
                found: scalars.len(),
            });
        }
        if self.has_spectral() {
            self.pending_scalars = Some(scalars);
        } else {
            self.table.push_row(scalars, None);
        }
        Ok(())
    }

    fn into_table(self) -> DataTable {
        if self.pending_scalars.is_some() {
            debug!("dropping incomplete trailing spectral block");
        }
        self.table
    }
}

/// On-demand reader for a finalized scan's data block.
///
/// Opens its own file handle per call, so distinct scans can be
/// materialized by independent workers.
#[derive(Debug, Clone)]
pub struct ScanDataReader<C = SpecLineClassifier> {
    classifier: C,
    config: ReaderConfig,
}

impl ScanDataReader<SpecLineClassifier> {
    pub fn new(config: ReaderConfig) -> Self {
        Self::with_classifier(SpecLineClassifier::new(), config)
    }
}

impl<C: LineClassifier> ScanDataReader<C> {
    /// Compose the reader with a custom line classifier
    pub fn with_classifier(classifier: C, config: ReaderConfig) -> Self {
        Self { classifier, config }
    }

    /// Materialize the scan's data table and raw header lines.
    ///
    /// Consumes data lines until the next header block, an unresumed abort,
    /// or end of stream. On a row shape failure the scan is demoted to
    /// `NODATA` with no table; abort/resume markers mid-data are honored
    /// like during header parsing.
    pub fn read(&self, scan: &mut ScanRecord) -> Result<()> {
        if scan.status == ScanStatus::NoData {
            debug!("{} has been aborted - no data available", scan.name());
            scan.data = None;
            return Ok(());
        }
        let Some(data_offset) = scan.data_offset else {
            debug!("{} has no data offset", scan.name());
            scan.data = None;
            return Ok(());
        };

        let handle = std::fs::File::open(&scan.path)?;
        let mut reader = BufReader::new(handle);

        // capture the raw header block first
        reader.seek(SeekFrom::Start(scan.header_offset))?;
        let mut header = Vec::new();
        let mut pos = scan.header_offset;
        let mut buf = Vec::new();
        while pos < data_offset {
            buf.clear();
            let raw_len = reader.read_until(b'\n', &mut buf)?;
            if raw_len == 0 {
                break;
            }
            pos += raw_len as u64;
            header.push(String::from_utf8_lossy(&buf).trim().to_string());
        }

        let mut builder = TableBuilder::new(
            &scan.column_names,
            scan.spectral.as_ref(),
            self.config.spectral_line_capacity,
        );
        let mut aborted = false;

        loop {
            buf.clear();
            let raw_len = reader.read_until(b'\n', &mut buf)?;
            if raw_len == 0 {
                break;
            }
            let decoded = String::from_utf8_lossy(&buf);
            let line = decoded.trim();
            if line.is_empty() {
                continue;
            }
            let classified = self.classifier.classify(line);

            if aborted {
                match classified.kind {
                    LineKind::Resume => {
                        debug!("{} resumed", scan.name());
                        aborted = false;
                        scan.status = ScanStatus::Ok;
                        continue;
                    }
                    LineKind::Comment => continue,
                    _ => break,
                }
            }

            match classified.kind {
                LineKind::Abort => {
                    warn!("{} aborted mid-data", scan.name());
                    aborted = true;
                    scan.status = ScanStatus::Aborted;
                }
                LineKind::Resume | LineKind::Comment => {}
                LineKind::Data | LineKind::Unrecognized => {
                    if let Err(err) = builder.push_line(line) {
                        warn!("{}: {err}", scan.name());
                        scan.status = ScanStatus::NoData;
                        scan.data = None;
                        scan.header = header;
                        return Ok(());
                    }
                }
                // the next scan's header block ends this one's data
                _ => break,
            }
        }

        let table = builder.into_table();
        scan.header = header;
        if table.is_empty() {
            debug!("{} produced no rows", scan.name());
            scan.status = ScanStatus::NoData;
            scan.data = None;
        } else {
            scan.data = Some(table);
        }
        Ok(())
    }
}
