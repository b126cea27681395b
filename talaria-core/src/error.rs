//! Error types for persisted-state decoding.

use thiserror::Error;

/// Errors that can occur when decoding the range statistics file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// File was written by an incompatible firmware version
    #[error("unsupported range stats version {0}")]
    BadVersion(String),

    /// File ended before all sectors were read
    #[error("range stats file truncated at line {0}")]
    Truncated(usize),

    /// A line did not parse as the expected CSV fields
    #[error("malformed range stats line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}
