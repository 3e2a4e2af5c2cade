//! Line classification for scan log files.
//!
//! Classifies a single decoded, whitespace-trimmed line into exactly one
//! line kind plus its payload substring. Classification is prefix/pattern
//! based and mutually exclusive in a fixed priority order, so a line like
//! `#TIM ...` is always a timestamp and never an exposure declaration even
//! though both share the `#T` prefix.
//!
//! Numeric token extraction lives here as well since the same token grammar
//! (signed integers, decimals, exponents, `inf`/`nan`) is shared by motor
//! positions, exposure times, spectral declarations and data rows.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{
    COLUMN_NAMES_MARKER, COMMAND_MARKER, COMMENT_MARKER, EXPOSURE_MARKER, HEADER_SIGIL,
    MOTOR_NAMES_MARKER, MOTOR_VALUES_MARKER, NEW_FILE_HEADER_MARKER, SCAN_START_MARKER,
    SPECTRAL_CHANNELS_MARKER, SPECTRAL_FORMAT_MARKER, TIMESTAMP_MARKER,
};

static SCAN_ABORTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#C[a-zA-Z0-9: .]*Scan aborted").expect("valid regex"));
static SCAN_RESUMED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#C[a-zA-Z0-9: .]*Scan resumed").expect("valid regex"));
static FLOAT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[+-]?(?:inf|nan|\d+\.?\d*(?:e[+-]?\d+)?|\.\d+(?:e[+-]?\d+)?)")
        .expect("valid regex")
});
static INT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]?\d+").expect("valid regex"));
static TIME_OF_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\d:\d\d:\d\d").expect("valid regex"));
static MULTI_BLANK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static DOUBLE_BLANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("valid regex"));

/// The fixed set of line kinds a scan log line can classify as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `#C ... Scan aborted` marker
    Abort,
    /// `#C ... Scan resumed` marker
    Resume,
    /// Generic comment consumed silently (`#ATT`)
    Comment,
    /// New file-header block (`#E`), resets file-level motor defaults
    NewFileHeader,
    /// Initial motor names (`#MOT`)
    MotorNames,
    /// Initial motor positions (`#VAL`)
    MotorValues,
    /// Start of a new scan (`#RUN`)
    ScanStart,
    /// Scan command (`#CMD`)
    Command,
    /// Date and time (`#TIM`)
    Timestamp,
    /// Integration time (`#T`)
    Exposure,
    /// Column schema (`#COL`)
    ColumnNames,
    /// Spectral format declaration (`#@MCA`)
    SpectralFormat,
    /// Spectral channel declaration (`#@CHANN`)
    SpectralChannels,
    /// Any other line beginning with the comment sigil
    Header,
    /// Data row: optional sign followed by a digit
    Data,
    /// Everything else
    Unrecognized,
}

/// One classified line: its kind plus the payload after the marker prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedLine<'a> {
    pub kind: LineKind,
    pub payload: &'a str,
}

impl<'a> ClassifiedLine<'a> {
    fn new(kind: LineKind, payload: &'a str) -> Self {
        Self {
            kind,
            payload: payload.trim(),
        }
    }
}

/// Capability interface for line classification.
///
/// The parser and data reader compose a classifier rather than hard-coding
/// the dialect.
pub trait LineClassifier {
    /// Classify one trimmed line into exactly one line kind
    fn classify<'a>(&self, line: &'a str) -> ClassifiedLine<'a>;
}

/// Default classifier for the beamline's scan log dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecLineClassifier;

impl SpecLineClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl LineClassifier for SpecLineClassifier {
    fn classify<'a>(&self, line: &'a str) -> ClassifiedLine<'a> {
        // Abort and resume outrank every other interpretation of a `#C` line.
        if SCAN_ABORTED_RE.is_match(line) {
            return ClassifiedLine::new(LineKind::Abort, line);
        }
        if SCAN_RESUMED_RE.is_match(line) {
            return ClassifiedLine::new(LineKind::Resume, line);
        }
        if let Some(rest) = line.strip_prefix(COMMENT_MARKER) {
            return ClassifiedLine::new(LineKind::Comment, rest);
        }
        if let Some(rest) = line.strip_prefix(NEW_FILE_HEADER_MARKER) {
            return ClassifiedLine::new(LineKind::NewFileHeader, rest);
        }
        if let Some(rest) = line.strip_prefix(MOTOR_NAMES_MARKER) {
            return ClassifiedLine::new(LineKind::MotorNames, rest);
        }
        if let Some(rest) = line.strip_prefix(MOTOR_VALUES_MARKER) {
            return ClassifiedLine::new(LineKind::MotorValues, rest);
        }
        if let Some(rest) = line.strip_prefix(SCAN_START_MARKER) {
            return ClassifiedLine::new(LineKind::ScanStart, rest);
        }
        if let Some(rest) = line.strip_prefix(COMMAND_MARKER) {
            return ClassifiedLine::new(LineKind::Command, rest);
        }
        // `#TIM` must be tried before the bare `#T` prefix.
        if let Some(rest) = line.strip_prefix(TIMESTAMP_MARKER) {
            return ClassifiedLine::new(LineKind::Timestamp, rest);
        }
        if let Some(rest) = line.strip_prefix(EXPOSURE_MARKER) {
            return ClassifiedLine::new(LineKind::Exposure, rest);
        }
        if let Some(rest) = line.strip_prefix(COLUMN_NAMES_MARKER) {
            return ClassifiedLine::new(LineKind::ColumnNames, rest);
        }
        if let Some(rest) = line.strip_prefix(SPECTRAL_FORMAT_MARKER) {
            return ClassifiedLine::new(LineKind::SpectralFormat, rest);
        }
        if let Some(rest) = line.strip_prefix(SPECTRAL_CHANNELS_MARKER) {
            return ClassifiedLine::new(LineKind::SpectralChannels, rest);
        }
        if line.starts_with(HEADER_SIGIL) {
            return ClassifiedLine::new(LineKind::Header, line);
        }
        if is_data_row(line) {
            return ClassifiedLine::new(LineKind::Data, line);
        }
        ClassifiedLine::new(LineKind::Unrecognized, line)
    }
}

/// A data row begins with an optional run of sign characters and a digit
fn is_data_row(line: &str) -> bool {
    line.trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_digit())
}

/// Extract all well-formed float tokens from a line.
///
/// Accepts signed integers, decimals, exponent notation and the literals
/// `inf`/`-inf`/`nan` in any case. Tokens that fail conversion are dropped
/// silently rather than aborting the line.
pub fn extract_floats(text: &str) -> Vec<f64> {
    FLOAT_TOKEN_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// Extract all unsigned integer tokens from a line.
///
/// Used for spectral channel payloads. Tokens outside the `u32` range or
/// carrying a minus sign are dropped silently, consistent with the
/// malformed-token policy.
pub fn extract_ints(text: &str) -> Vec<u32> {
    INT_TOKEN_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().trim_start_matches('+').parse::<u32>().ok())
        .collect()
}

/// Split a `#TIM` payload into `(date, time)`.
///
/// The time is the first `hh:mm:ss` group; everything else, with blanks
/// collapsed, is the date. A payload without a time group yields an empty
/// time string.
pub fn split_timestamp(payload: &str) -> (String, String) {
    match TIME_OF_DAY_RE.find(payload) {
        Some(m) => {
            let time = m.as_str().to_string();
            let rest = format!("{} {}", &payload[..m.start()], &payload[m.end()..]);
            (collapse_blanks(&rest), time)
        }
        None => (collapse_blanks(payload), String::new()),
    }
}

/// Split a motor-name payload on runs of two or more blanks.
///
/// Motor names may contain a single embedded space, so only double blanks
/// separate names.
pub fn split_motor_names(payload: &str) -> Vec<String> {
    DOUBLE_BLANK_RE
        .split(payload.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a column-name payload on whitespace runs
pub fn split_column_names(payload: &str) -> Vec<String> {
    payload.split_whitespace().map(str::to_string).collect()
}

fn collapse_blanks(text: &str) -> String {
    MULTI_BLANK_RE.replace_all(text.trim(), " ").into_owned()
}
