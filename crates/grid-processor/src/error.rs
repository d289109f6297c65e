//! Error types for grid processing.

use thiserror::Error;

/// Errors that can occur during grid normalization and aggregation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridProcessorError {
    /// None of the acceptable variable names is present in the payload.
    #[error("no acceptable variable found (tried {tried:?}, payload has {available:?})")]
    VariableNotFound {
        tried: Vec<String>,
        available: Vec<String>,
    },

    /// Array shape disagrees with the coordinate vectors.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Stack members do not share shape and coordinates.
    #[error("stack member {index} does not match the first grid: {reason}")]
    StackMismatch { index: usize, reason: String },

    /// Aggregation requested over zero grids.
    #[error("cannot aggregate an empty stack")]
    EmptyStack,

    /// Every cell was masked after filtering.
    #[error("grid has no valid cells after masking")]
    NoValidData,
}

impl GridProcessorError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a StackMismatch error.
    pub fn stack_mismatch(index: usize, reason: impl Into<String>) -> Self {
        Self::StackMismatch {
            index,
            reason: reason.into(),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
