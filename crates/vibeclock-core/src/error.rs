//! Error types for vibeclock
//!
//! All errors are derived with `thiserror` so that `?` converts the
//! underlying IO, JSON, TOML and HTTP errors automatically.
//!
//! # Example
//!
//! ```
//! use vibeclock_core::error::{Result, VibeclockError};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to VibeclockError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for vibeclock operations
#[derive(Error, Debug)]
pub enum VibeclockError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// A record lacked a field the reader cannot do without
    #[error("Missing required field `{field}` in {file}")]
    MissingField {
        /// The file that caused the error
        file: PathBuf,
        /// Name of the missing field
        field: &'static str,
    },

    /// Summing a session's token counts overflowed
    #[error("Token count overflow in session {session} ({model})")]
    TokenOverflow {
        /// Session being summed
        session: String,
        /// Model whose counter overflowed
        model: String,
    },

    /// Invalid timestamp format
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid timezone
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Unknown source name
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote API returned a non-success status
    #[error("Remote API error ({status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Aggregated stats broke an internal invariant
    #[error("Aggregation invariant violated: {0}")]
    InvariantViolation(String),

    /// The privacy gate rejected an export
    #[error("push aborted: potential PII detected ({findings} finding(s)); nothing was sent")]
    PiiDetected {
        /// Number of offending string values
        findings: usize,
    },
}

/// Convenience type alias for Results in vibeclock
pub type Result<T> = std::result::Result<T, VibeclockError>;
