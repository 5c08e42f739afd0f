//! Multi-valued secondary indexes over an ordered, transactional key-value
//! engine.
//!
//! Each `(key, value)` pair is stored as one engine key laid out as
//! `[key length][key][value]` with an empty engine value, so all values of a
//! key form one contiguous, byte-ordered range. [`index::MultiIndex`] offers
//! add/remove/find/scan over that layout through seekable
//! [`index::IndexCursor`]s, and [`index::IndexStats`] answers cardinality
//! questions within a caller-supplied cost budget.
//!
//! The engine is consumed through the traits in [`storage::engine`];
//! [`storage::mem::MemStore`] is an in-memory implementation.

#![warn(missing_docs)]

pub mod error;
pub mod index;
pub mod logging;
pub mod primitives;
pub mod storage;
pub mod txn;

pub use error::{IndexError, Result};
pub use index::{
    BidirectionalIndex, Count, CursorState, IndexCursor, IndexOptions, IndexStats, MaxCost,
    MultiIndex, MultiValuedIndex, ReverseLookup,
};
pub use storage::engine::{EngineError, KvIterator, KvStore, KvTransaction, Namespace};
pub use storage::mem::{MemStore, MemStoreOptions};
pub use txn::TxContext;
