//! Error type of the index layer.
//!
//! Engine failures keep their cause:
//!
//! ```
//! use mvindex::{EngineError, IndexError};
//!
//! let err = IndexError::from(EngineError::TransactionClosed);
//! assert!(matches!(err, IndexError::Storage(EngineError::TransactionClosed)));
//! ```

use thiserror::Error;

use crate::storage::engine::EngineError;

/// Convenience alias used throughout the index layer.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors surfaced by the index layer.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A key or value cannot be encoded, or stored bytes cannot be decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// The storage engine rejected or failed an operation.
    #[error("storage error: {0}")]
    Storage(#[from] EngineError),
    /// The cursor cannot translate the requested item back into a physical position.
    #[error("unsupported positioning: {0}")]
    UnsupportedPositioning(&'static str),
    /// A point lookup found no entry.
    #[error("not found")]
    NotFound,
    /// The operation is not valid in the cursor's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// A caller-supplied setting was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl IndexError {
    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        IndexError::Encoding(msg.into())
    }
}
