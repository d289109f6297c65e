//! Fetch error taxonomy.

use grid_processor::GridProcessorError;
use griddap_parser::GriddapError;
use storage::StorageError;
use thiserror::Error;

use crate::transport::TransportError;

/// Outcome of a failed attempt against one candidate.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection failure or timeout. Retried within the candidate.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// Non-200 response. Never retried within the candidate.
    #[error("server returned HTTP {status} for {url}")]
    Server { status: u16, url: String },

    /// Body could not be decoded.
    #[error("undecodable response: {0}")]
    Parse(String),

    #[error("no acceptable variable (tried {tried:?}, found {available:?})")]
    VariableNotFound {
        tried: Vec<String>,
        available: Vec<String>,
    },

    /// Every cell masked after filtering.
    #[error("grid has no valid cells")]
    NoValidData,

    #[error("all {candidates} candidates failed for {what}{}", last_error_suffix(.last))]
    AllSourcesExhausted {
        what: String,
        candidates: usize,
        last: Option<Box<FetchError>>,
    },
}

impl FetchError {
    /// Worth retrying against the same candidate.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }

    /// Worth trying the next candidate. An all-masked grid is the same on
    /// every mirror, so it ends the chain.
    pub fn escalates(&self) -> bool {
        !matches!(self, FetchError::NoValidData | FetchError::AllSourcesExhausted { .. })
    }

    /// Short label for metrics and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Server { .. } => "server",
            FetchError::Parse(_) => "parse",
            FetchError::VariableNotFound { .. } => "variable_not_found",
            FetchError::NoValidData => "no_valid_data",
            FetchError::AllSourcesExhausted { .. } => "all_sources_exhausted",
        }
    }
}

fn last_error_suffix(last: &Option<Box<FetchError>>) -> String {
    last.as_ref()
        .map(|e| format!(", last error: {}", e))
        .unwrap_or_default()
}

impl From<GriddapError> for FetchError {
    fn from(err: GriddapError) -> Self {
        FetchError::Parse(err.to_string())
    }
}

impl From<GridProcessorError> for FetchError {
    fn from(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::VariableNotFound { tried, available } => {
                FetchError::VariableNotFound { tried, available }
            }
            GridProcessorError::NoValidData => FetchError::NoValidData,
            other => FetchError::Parse(other.to_string()),
        }
    }
}

/// Errors that stop a whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] sst_common::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
