//! Error handling for scanlog processing operations.
//!
//! Provides error types with context for file discovery, template
//! resolution, and I/O failures. Per-scan problems are not errors: they
//! degrade the scan's status and parsing continues.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanlogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan file not found at path: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid file name template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Counter hook failed for {scan}: {reason}")]
    CounterHook { scan: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ScanlogError>;
