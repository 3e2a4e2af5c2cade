//! Core data structures for scanlog processing.
//!
//! Defines the scan record with its header metadata and lazily materialized
//! data table, the per-file parse state, and the spectral payload
//! parameters.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::constants::SCAN_NAME_PREFIX;
use crate::error::{Result, ScanlogError};
use crate::hooks::CounterHook;

/// Status of one parsed scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Header and data are consistent
    Ok,
    /// No usable data block (missing, malformed, or shape mismatch)
    NoData,
    /// The operator aborted the scan and it never resumed
    Aborted,
    /// Header metadata itself is damaged
    Corrupted,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Ok => "OK",
            ScanStatus::NoData => "NODATA",
            ScanStatus::Aborted => "ABORTED",
            ScanStatus::Corrupted => "CORRUPTED",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a spectral (MCA) payload declared in a scan header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectralParams {
    /// Index of the spectral column within the row
    pub column_index: usize,
    /// Number of channels per spectrum
    pub channel_count: usize,
    /// First channel number
    pub start_channel: u32,
    /// Last channel number
    pub stop_channel: u32,
}

/// Materialized data table of one scan.
///
/// Rows mix scalar counters with an optional fixed-length spectrum per row.
/// Row order is file order; scalar field order follows the declared column
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    spectral_column: Option<String>,
    spectra: Vec<Vec<u32>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, spectral_column: Option<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            spectral_column,
            spectra: Vec::new(),
        }
    }

    pub(crate) fn push_row(&mut self, scalars: Vec<f64>, spectrum: Option<Vec<u32>>) {
        debug_assert_eq!(scalars.len(), self.columns.len());
        self.rows.push(scalars);
        if let Some(spectrum) = spectrum {
            self.spectra.push(spectrum);
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ordered scalar column names
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Name of the spectral column, if the scan declared one
    pub fn spectral_column(&self) -> Option<&str> {
        self.spectral_column.as_deref()
    }

    /// Gather one scalar column by name
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Scalar fields of one row, in column order
    pub fn scalar_row(&self, row: usize) -> Option<&[f64]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// One scalar value by column name and row index
    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.rows.get(row).map(|r| r[idx])
    }

    /// The spectrum attached to one row, if spectral data is present
    pub fn spectrum(&self, row: usize) -> Option<&[u32]> {
        self.spectra.get(row).map(Vec::as_slice)
    }

    /// Replace the values of an existing scalar column.
    ///
    /// Used by counter hooks to override a counter before persistence.
    pub fn set_column(&mut self, name: &str, values: &[f64]) -> Result<()> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ScanlogError::Configuration {
                message: format!("unknown column '{name}'"),
            })?;
        if values.len() != self.rows.len() {
            return Err(ScanlogError::Configuration {
                message: format!(
                    "column '{}' has {} rows, got {} values",
                    name,
                    self.rows.len(),
                    values.len()
                ),
            });
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = *value;
        }
        Ok(())
    }

    /// Append a derived scalar column.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|c| *c == name) {
            return Err(ScanlogError::Configuration {
                message: format!("column '{name}' already exists"),
            });
        }
        if values.len() != self.rows.len() {
            return Err(ScanlogError::Configuration {
                message: format!(
                    "table has {} rows, got {} values for '{}'",
                    self.rows.len(),
                    values.len(),
                    name
                ),
            });
        }
        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }
}

/// One scan: header metadata plus a lazily materialized data table.
///
/// Records are immutable once appended to a file's scan list; only the data
/// reader touches `data`, `header` and (on shape failures) `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Scan number, unique within the owning file
    pub number: u32,
    /// Scan command as written by the acquisition system
    pub command: String,
    /// Date portion of the scan timestamp, as written
    pub date: String,
    /// Time of day (`hh:mm:ss`), as written
    pub time: String,
    /// Integration time in seconds; NaN when the header never declared one
    pub integration_time: f64,
    /// Ordered scalar column schema
    pub column_names: Vec<String>,
    /// Byte offset of the scan header within the owning file
    pub header_offset: u64,
    /// Byte offset of the first data row; absent when the scan never
    /// produced data
    pub data_offset: Option<u64>,
    /// Motor names paired by index with `init_motor_values`
    pub init_motor_names: Vec<String>,
    /// Initial motor positions; may legitimately be shorter or longer than
    /// the name list on malformed input
    pub init_motor_values: Vec<f64>,
    /// Spectral payload parameters, present only for MCA scans
    pub spectral: Option<SpectralParams>,
    /// Scan status
    pub status: ScanStatus,
    /// Owning file
    pub path: PathBuf,
    #[serde(skip)]
    pub(crate) header: Vec<String>,
    #[serde(skip)]
    pub(crate) data: Option<DataTable>,
}

impl ScanRecord {
    /// Derived scan name, `scan_<number>`, used as the downstream group key
    pub fn name(&self) -> String {
        format!("{}{}", SCAN_NAME_PREFIX, self.number)
    }

    /// Whether the scan declares a spectral payload
    pub fn has_spectral(&self) -> bool {
        self.spectral.is_some()
    }

    /// Parse the stored date/time strings into a timestamp.
    ///
    /// Returns `None` when the header carried no timestamp or an
    /// unrecognized format.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let joined = format!("{} {}", self.date, self.time);
        let joined = joined.trim();
        NaiveDateTime::parse_from_str(joined, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(joined, "%a %b %d %Y %H:%M:%S"))
            .ok()
    }

    /// Raw header lines, captured when the data table is materialized
    pub fn header_lines(&self) -> &[String] {
        &self.header
    }

    /// The materialized data table, if any
    pub fn data(&self) -> Option<&DataTable> {
        self.data.as_ref()
    }

    /// Drop a materialized table to bound memory; offsets stay valid so the
    /// table can be re-read later.
    pub fn clear_data(&mut self) {
        self.data = None;
        self.header.clear();
    }

    /// Run a counter post-processing hook over the materialized table.
    ///
    /// The hook sees the raw row table and may derive or override counters;
    /// it cannot touch offsets or status. A no-op when no table is loaded.
    pub fn apply_counter_hook(&mut self, hook: &dyn CounterHook) -> Result<()> {
        if let Some(mut table) = self.data.take() {
            let result = hook.process(self, &mut table);
            self.data = Some(table);
            result
        } else {
            Ok(())
        }
    }
}

/// Parse state of one physical scan log file.
///
/// Created empty and populated by repeated `parse`/`update` calls; the scan
/// list is append-only and `last_offset` only ever moves forward, except for
/// the deliberate tail re-exposure of the most recent scan.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    path: PathBuf,
    last_offset: u64,
    scans: Vec<ScanRecord>,
    pub(crate) file_motor_names: Vec<String>,
}

impl ParsedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_offset: 0,
            scans: Vec::new(),
            file_motor_names: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next unread byte offset
    pub fn last_offset(&self) -> u64 {
        self.last_offset
    }

    /// Scans in discovery order
    pub fn scans(&self) -> &[ScanRecord] {
        &self.scans
    }

    /// Look up a scan by number
    pub fn scan(&self, number: u32) -> Option<&ScanRecord> {
        self.scans.iter().find(|s| s.number == number)
    }

    /// Mutable lookup, used to materialize or clear a scan's data
    pub fn scan_mut(&mut self, number: u32) -> Option<&mut ScanRecord> {
        self.scans.iter_mut().find(|s| s.number == number)
    }

    /// Mutable access to all scans, in discovery order
    pub fn scans_mut(&mut self) -> &mut [ScanRecord] {
        &mut self.scans
    }

    pub(crate) fn push_scan(&mut self, scan: ScanRecord) {
        self.scans.push(scan);
    }

    pub(crate) fn pop_scan(&mut self) -> Option<ScanRecord> {
        self.scans.pop()
    }

    pub(crate) fn set_last_offset(&mut self, offset: u64) {
        self.last_offset = offset;
    }
}
