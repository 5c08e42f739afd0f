use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use super::EngineError;

/// Handle naming an isolated keyspace (column family) inside the engine.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    name: Arc<str>,
}

impl Namespace {
    /// Creates a handle for `name`.
    pub fn new(name: &str) -> Self {
        Self { name: Arc::from(name) }
    }

    /// Returns the namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Namespace").field(&self.name).finish()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Approximate record statistics for the unflushed (in-memory) part of a range.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemTableStats {
    /// Approximate number of records.
    pub count: u64,
    /// Approximate total size of those records in bytes.
    pub size: u64,
}

/// An ordered, transactional, byte-keyed key-value store.
pub trait KvStore: Send + Sync {
    /// Transaction type handed out by [`KvStore::begin`].
    type Txn: KvTransaction;

    /// Starts a new read-write transaction.
    fn begin(&self) -> Result<Self::Txn, EngineError>;

    /// Approximate count and size of in-memory records between `lower` and `upper`.
    fn approximate_memtable_stats(
        &self,
        ns: &Namespace,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<MemTableStats, EngineError>;

    /// Approximate on-disk size in bytes of flushed records between `lower` and `upper`.
    fn approximate_size(
        &self,
        ns: &Namespace,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<u64, EngineError>;
}

/// A transaction against a [`KvStore`].
///
/// Methods take `&self` so one transaction can be shared by every index
/// touched in the same unit of work; implementations synchronise internally.
pub trait KvTransaction: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, ns: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn put(&self, ns: &Namespace, key: &[u8], value: &[u8]) -> Result<(), EngineError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, ns: &Namespace, key: &[u8]) -> Result<(), EngineError>;

    /// Opens an iterator over `[lower, upper)` style bounds.
    ///
    /// The iterator owns its read view: it sees the entries visible to this
    /// transaction at creation time and none of the writes issued afterwards.
    fn iterator(
        &self,
        ns: &Namespace,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<Box<dyn KvIterator>, EngineError>;

    /// Makes the transaction's writes visible to others.
    fn commit(&self) -> Result<(), EngineError>;

    /// Discards the transaction's writes.
    fn rollback(&self) -> Result<(), EngineError>;
}

/// Bidirectional iterator over a bounded key range.
///
/// Follows the usual LSM iterator protocol: position with one of the seek
/// methods, check [`KvIterator::valid`], then step with `next`/`prev`.
pub trait KvIterator: Send {
    /// Positions on the first entry in range.
    fn seek_to_first(&mut self);

    /// Positions on the last entry in range.
    fn seek_to_last(&mut self);

    /// Positions on the first entry whose key is `>= target`.
    fn seek(&mut self, target: &[u8]);

    /// Steps forward. Only meaningful while [`KvIterator::valid`].
    fn next(&mut self);

    /// Steps backward. Only meaningful while [`KvIterator::valid`].
    fn prev(&mut self);

    /// Whether the iterator currently rests on an entry.
    fn valid(&self) -> bool;

    /// Key of the current entry, `None` when not valid.
    fn key(&self) -> Option<&[u8]>;

    /// Reports any error hit while iterating.
    fn status(&self) -> Result<(), EngineError>;
}
