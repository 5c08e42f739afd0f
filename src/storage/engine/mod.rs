//! Storage engine contract consumed by the index layer.
//!
//! The index only needs an ordered, byte-keyed, transactional key-value
//! store with bounded iterators and cheap approximate statistics. These
//! traits describe exactly that surface; [`crate::storage::mem::MemStore`]
//! is the bundled implementation.

mod error;
mod traits;

pub use error::EngineError;
pub use traits::{KvIterator, KvStore, KvTransaction, MemTableStats, Namespace};
