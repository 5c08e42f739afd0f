//! Transaction context resolution.
//!
//! Index calls receive a [`TxContext`] explicitly. A context carrying a
//! transaction routes every engine call of the operation through it and
//! leaves commit/rollback to the caller. An empty context means
//! auto-commit: the operation opens its own transaction and commits it on
//! success or rolls it back on failure.

use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::storage::engine::{KvStore, KvTransaction};

/// The ambient transaction of the calling execution context, if any.
pub struct TxContext<T> {
    current: Option<Arc<T>>,
}

impl<T> TxContext<T> {
    /// A context with no active transaction; operations auto-commit.
    pub fn none() -> Self {
        Self { current: None }
    }

    /// A context whose operations join `tx`.
    pub fn active(tx: Arc<T>) -> Self {
        Self { current: Some(tx) }
    }

    /// The active transaction, `None` meaning auto-commit.
    pub fn current_transaction(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// Whether operations under this context auto-commit.
    pub fn is_auto_commit(&self) -> bool {
        self.current.is_none()
    }
}

impl<T> Default for TxContext<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> Clone for TxContext<T> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

enum Resolved<T> {
    Ambient(Arc<T>),
    AutoCommit(T),
}

impl<T: KvTransaction> Resolved<T> {
    fn tx(&self) -> &T {
        match self {
            Resolved::Ambient(tx) => tx.as_ref(),
            Resolved::AutoCommit(tx) => tx,
        }
    }
}

/// Runs `op` against the transaction `ctx` resolves to.
///
/// Every engine call made by `op` sees the same transaction.
pub(crate) fn with_transaction<S, R>(
    store: &S,
    ctx: &TxContext<S::Txn>,
    op: impl FnOnce(&S::Txn) -> Result<R>,
) -> Result<R>
where
    S: KvStore,
{
    let resolved = match ctx.current_transaction() {
        Some(tx) => Resolved::Ambient(Arc::clone(tx)),
        None => Resolved::AutoCommit(store.begin()?),
    };
    let outcome = op(resolved.tx());
    match resolved {
        Resolved::Ambient(_) => outcome,
        Resolved::AutoCommit(tx) => match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "auto-commit rollback failed");
                }
                Err(err)
            }
        },
    }
}
