//! Error types for griddap response decoding.

use thiserror::Error;

/// Result type for griddap parser operations.
pub type GriddapResult<T> = Result<T, GriddapError>;

/// Error types for griddap decoding.
#[derive(Error, Debug)]
pub enum GriddapError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response body is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing required column, variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Structurally invalid response
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Time axis entry that is not ISO-8601
    #[error("Invalid timestamp in time axis: {0}")]
    InvalidTimestamp(String),
}
