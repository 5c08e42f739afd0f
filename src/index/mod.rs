//! Multi-valued secondary indexes over an ordered key-value engine.
//!
//! One logical key maps to any number of logical values. Each pair becomes a
//! single engine key (see [`codec`]), so the values of a key are a contiguous
//! byte range that [`IndexCursor`]s walk in order.

pub mod codec;

mod bidirectional;
mod cursor;
mod metrics;
mod multi;
mod options;
mod stats;

use std::ops::Bound;

pub use bidirectional::BidirectionalIndex;
pub use cursor::{CursorItems, CursorState, IndexCursor};
pub use metrics::{default_metrics, CounterMetrics, IndexMetrics, NoopMetrics};
pub use multi::MultiIndex;
pub use options::{IndexOptions, DEFAULT_FALLBACK_RECORD_SIZE};
pub use stats::{Count, IndexStats, MaxCost};

use crate::error::Result;
use crate::storage::engine::KvTransaction;
use crate::txn::TxContext;

/// Operations shared by every index variant.
///
/// Optional capabilities are discovered through accessor methods such as
/// [`MultiValuedIndex::reverse_lookup`] rather than by downcasting.
pub trait MultiValuedIndex<K, V> {
    /// Transaction type of the backing engine.
    type Txn: KvTransaction;

    /// Index name.
    fn name(&self) -> &str;

    /// Adds `(key, value)`. Adding an existing pair is a no-op.
    fn add_entry(&self, ctx: &TxContext<Self::Txn>, key: &K, value: &V) -> Result<()>;

    /// Removes `(key, value)` if present.
    fn remove_entry(&self, ctx: &TxContext<Self::Txn>, key: &K, value: &V) -> Result<()>;

    /// Removes every value of `key`, returning how many entries were removed.
    fn remove_all_entries(&self, ctx: &TxContext<Self::Txn>, key: &K) -> Result<u64>;

    /// Smallest value of `key` in byte order, [`crate::IndexError::NotFound`] if none.
    fn find_first(&self, ctx: &TxContext<Self::Txn>, key: &K) -> Result<V>;

    /// Cursor over the values of `key`.
    fn find(&self, ctx: &TxContext<Self::Txn>, key: &K) -> Result<IndexCursor<V>>;

    /// Cursor yielding the key of every entry; a key with N values appears N times.
    fn scan_keys(&self, ctx: &TxContext<Self::Txn>) -> Result<IndexCursor<K>>;

    /// Cursor yielding each key once.
    fn scan_distinct_keys(&self, ctx: &TxContext<Self::Txn>) -> Result<IndexCursor<K>>;

    /// Cursor yielding the value of every entry. Cannot seek.
    fn scan_values(&self, ctx: &TxContext<Self::Txn>) -> Result<IndexCursor<V>>;

    /// Number of entries, by full scan.
    fn count(&self, ctx: &TxContext<Self::Txn>) -> Result<u64>;

    /// Number of values of `key`, by scanning its range.
    fn count_key(&self, ctx: &TxContext<Self::Txn>, key: &K) -> Result<u64>;

    /// Physical range holding the entries of `key`.
    fn key_bounds(&self, key: &K) -> Result<(Vec<u8>, Bound<Vec<u8>>)>;

    /// Approximate number of entries within a physical range.
    fn estimate_range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<u64>;

    /// Approximate number of entries in the whole index.
    fn estimate_index_size(&self) -> Result<u64>;

    /// Value-to-keys lookup, when the variant maintains one.
    fn reverse_lookup(&self) -> Option<&dyn ReverseLookup<K, V, Txn = Self::Txn>> {
        None
    }
}

/// Capability of finding the keys that hold a value.
pub trait ReverseLookup<K, V> {
    /// Transaction type of the backing engine.
    type Txn: KvTransaction;

    /// Cursor over the keys holding `value`.
    fn find_by_value(&self, ctx: &TxContext<Self::Txn>, value: &V) -> Result<IndexCursor<K>>;
}
