//! Engine error types.

use graphplan_core::ErrorKind;
use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Planning, execution or materialization failed.
    #[error(transparent)]
    Core(#[from] graphplan_core::Error),

    /// Engine configuration could not be read.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// A request could not be serialized for fingerprinting.
    #[error("cannot fingerprint request: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl Error {
    /// Category of this error. Engine-level failures are configuration
    /// or execution errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(err) => err.kind(),
            Error::Config(_) => ErrorKind::Configuration,
            Error::Fingerprint(_) => ErrorKind::Execution,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
