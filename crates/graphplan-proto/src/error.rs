//! Request IR error types.

use thiserror::Error;

/// Errors raised while building request or row values.
#[derive(Debug, Error)]
pub enum Error {
    /// A row has the wrong number of values.
    #[error("invalid row: expected {expected} values, got {actual}")]
    InvalidRow { expected: usize, actual: usize },

    /// Two row sets do not share a column list.
    #[error("column mismatch: {0}")]
    ColumnMismatch(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
