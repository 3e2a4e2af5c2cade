//! Counter post-processing hooks.
//!
//! Experiments often derive extra counters (normalized intensities,
//! combined detector channels) from the raw columns before persistence.
//! The core exposes the assembled row table to such a hook; the hook never
//! sees offsets or status.

use crate::error::Result;
use crate::models::{DataTable, ScanRecord};

/// Per-experiment counter post-processing.
///
/// Implementations may read scan metadata and derive or override columns in
/// the table. Invoked through [`ScanRecord::apply_counter_hook`] after a
/// table has been materialized.
pub trait CounterHook {
    fn process(&self, scan: &ScanRecord, table: &mut DataTable) -> Result<()>;
}
