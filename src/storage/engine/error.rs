use std::io;

use thiserror::Error;

/// Failures reported by a storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A concurrent transaction committed a conflicting write first.
    #[error("write conflict on namespace {namespace}")]
    Conflict {
        /// Namespace holding the conflicting key.
        namespace: String,
    },
    /// The namespace is not registered with the engine.
    #[error("namespace {0} not found")]
    NamespaceNotFound(String),
    /// The transaction was already committed or rolled back.
    #[error("transaction already finished")]
    TransactionClosed,
    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
