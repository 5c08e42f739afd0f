//! In-memory implementation of the storage engine contract.
//!
//! Each namespace keeps a memtable of recent writes (with tombstones) and a
//! flushed table standing in for on-disk runs, so the approximate statistics
//! split the same way an LSM engine's do. Not durable.

mod iter;
mod transaction;

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::storage::engine::{EngineError, KvStore, MemTableStats, Namespace};

pub use iter::MemIterator;
pub use transaction::MemTxn;

/// Default number of memtable records that triggers an automatic flush.
pub const DEFAULT_MEMTABLE_CAPACITY: usize = 4096;
/// Default per-record overhead charged by the size statistics.
pub const DEFAULT_RECORD_OVERHEAD: u64 = 8;

/// Configuration for [`MemStore`].
#[derive(Clone, Debug)]
pub struct MemStoreOptions {
    /// Memtable records per namespace before an automatic flush. Zero disables it.
    pub memtable_capacity: usize,
    /// Bytes added to every record's key and value length in size statistics.
    pub record_overhead: u64,
}

impl Default for MemStoreOptions {
    fn default() -> Self {
        Self {
            memtable_capacity: DEFAULT_MEMTABLE_CAPACITY,
            record_overhead: DEFAULT_RECORD_OVERHEAD,
        }
    }
}

impl MemStoreOptions {
    /// Sets the automatic flush threshold.
    pub fn memtable_capacity(mut self, records: usize) -> Self {
        self.memtable_capacity = records;
        self
    }

    /// Sets the per-record size overhead.
    pub fn record_overhead(mut self, bytes: u64) -> Self {
        self.record_overhead = bytes;
        self
    }
}

/// Ordered, transactional, in-memory key-value store.
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    options: MemStoreOptions,
    tables: RwLock<FxHashMap<Namespace, Table>>,
    commit_seq: AtomicU64,
    open_iterators: AtomicU64,
    /// Start sequence of every unfinished transaction, with multiplicity.
    active: Mutex<BTreeMap<u64, usize>>,
}

/// `None` marks a tombstone.
type Slot = Option<Vec<u8>>;

#[derive(Default)]
pub(crate) struct Table {
    memtable: BTreeMap<Vec<u8>, Slot>,
    flushed: BTreeMap<Vec<u8>, Vec<u8>>,
    last_write: FxHashMap<Vec<u8>, u64>,
}

impl Table {
    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.memtable.get(key) {
            Some(Some(value)) => Some(value.as_slice()),
            Some(None) => None,
            None => self.flushed.get(key).map(Vec::as_slice),
        }
    }

    /// Live entries in range, newest version of each key.
    fn visible_range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut out = BTreeMap::new();
        if range_is_empty(lower, upper) {
            return out;
        }
        for (key, value) in self.flushed.range::<[u8], _>((lower, upper)) {
            out.insert(key.clone(), value.clone());
        }
        for (key, slot) in self.memtable.range::<[u8], _>((lower, upper)) {
            match slot {
                Some(value) => {
                    out.insert(key.clone(), value.clone());
                }
                None => {
                    out.remove(key);
                }
            }
        }
        out
    }

    fn flush(&mut self) -> usize {
        let moved = self.memtable.len();
        for (key, slot) in std::mem::take(&mut self.memtable) {
            match slot {
                Some(value) => {
                    self.flushed.insert(key, value);
                }
                None => {
                    self.flushed.remove(&key);
                }
            }
        }
        moved
    }
}

/// Returns `true` when no key can satisfy both bounds.
pub(crate) fn range_is_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    let (lo, lo_inclusive) = match lower {
        Bound::Included(key) => (key, true),
        Bound::Excluded(key) => (key, false),
        Bound::Unbounded => return false,
    };
    let (hi, hi_inclusive) = match upper {
        Bound::Included(key) => (key, true),
        Bound::Excluded(key) => (key, false),
        Bound::Unbounded => return false,
    };
    match lo.cmp(hi) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => !(lo_inclusive && hi_inclusive),
        std::cmp::Ordering::Less => false,
    }
}

impl MemStore {
    /// Creates an empty store with default options.
    pub fn new() -> Self {
        Self::with_options(MemStoreOptions::default())
    }

    /// Creates an empty store.
    pub fn with_options(options: MemStoreOptions) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                options,
                tables: RwLock::new(FxHashMap::default()),
                commit_seq: AtomicU64::new(0),
                open_iterators: AtomicU64::new(0),
                active: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Registers `name` and returns its handle. Idempotent.
    pub fn create_namespace(&self, name: &str) -> Namespace {
        let ns = Namespace::new(name);
        self.inner.tables.write().entry(ns.clone()).or_default();
        ns
    }

    /// Whether `ns` has been registered.
    pub fn has_namespace(&self, ns: &Namespace) -> bool {
        self.inner.tables.read().contains_key(ns)
    }

    /// Number of iterators created and not yet dropped.
    pub fn open_iterators(&self) -> u64 {
        self.inner.open_iterators.load(Ordering::Acquire)
    }

    /// Moves the memtable of `ns` into its flushed table.
    pub fn flush(&self, ns: &Namespace) -> Result<(), EngineError> {
        let mut tables = self.inner.tables.write();
        let table = tables
            .get_mut(ns)
            .ok_or_else(|| EngineError::NamespaceNotFound(ns.name().to_owned()))?;
        let moved = table.flush();
        debug!(namespace = %ns, records = moved, "memtable flushed");
        Ok(())
    }

    /// Flushes every namespace.
    pub fn flush_all(&self) {
        let mut tables = self.inner.tables.write();
        for (ns, table) in tables.iter_mut() {
            let moved = table.flush();
            debug!(namespace = %ns, records = moved, "memtable flushed");
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_writes(&self, ns: &Namespace) -> usize {
        self.inner
            .with_table(ns, |table| table.last_write.len())
            .unwrap_or_default()
    }

    fn record_size(&self, key: &[u8], value: &[u8]) -> u64 {
        (key.len() + value.len()) as u64 + self.inner.options.record_overhead
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    pub(crate) fn with_table<R>(
        &self,
        ns: &Namespace,
        f: impl FnOnce(&Table) -> R,
    ) -> Result<R, EngineError> {
        let tables = self.tables.read();
        let table = tables
            .get(ns)
            .ok_or_else(|| EngineError::NamespaceNotFound(ns.name().to_owned()))?;
        Ok(f(table))
    }

    fn current_seq(&self) -> u64 {
        self.commit_seq.load(Ordering::Acquire)
    }

    /// Registers a new transaction and returns its start sequence.
    pub(crate) fn txn_started(&self) -> u64 {
        let mut active = self.active.lock();
        let start_seq = self.current_seq();
        *active.entry(start_seq).or_default() += 1;
        start_seq
    }

    pub(crate) fn txn_finished(&self, start_seq: u64) {
        let mut active = self.active.lock();
        if let Some(open) = active.get_mut(&start_seq) {
            *open -= 1;
            if *open == 0 {
                active.remove(&start_seq);
            }
        }
    }

    /// Commits at or below this sequence can no longer conflict with any
    /// open or future transaction.
    fn conflict_horizon(&self) -> u64 {
        let active = self.active.lock();
        active
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.current_seq())
    }

    pub(crate) fn iterator_opened(&self) {
        self.open_iterators.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn iterator_closed(&self) {
        self.open_iterators.fetch_sub(1, Ordering::AcqRel);
    }

    /// Applies a transaction's write set atomically, rejecting it when any
    /// key was committed by someone else after `start_seq`.
    pub(crate) fn apply(
        &self,
        start_seq: u64,
        writes: FxHashMap<Namespace, BTreeMap<Vec<u8>, Slot>>,
    ) -> Result<(), EngineError> {
        let mut tables = self.tables.write();
        for (ns, batch) in &writes {
            let table = tables
                .get(ns)
                .ok_or_else(|| EngineError::NamespaceNotFound(ns.name().to_owned()))?;
            let conflicted = batch.keys().find(|key| {
                table
                    .last_write
                    .get(*key)
                    .is_some_and(|&seq| seq > start_seq)
            });
            if let Some(key) = conflicted {
                debug!(
                    namespace = %ns,
                    start_seq,
                    key = %hex::encode(key),
                    "commit rejected by write conflict"
                );
                return Err(EngineError::Conflict {
                    namespace: ns.name().to_owned(),
                });
            }
        }
        let seq = self.commit_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let capacity = self.options.memtable_capacity;
        for (ns, batch) in writes {
            let Some(table) = tables.get_mut(&ns) else {
                continue;
            };
            for (key, slot) in batch {
                table.last_write.insert(key.clone(), seq);
                table.memtable.insert(key, slot);
            }
            if capacity > 0 && table.memtable.len() >= capacity {
                let moved = table.flush();
                debug!(namespace = %ns, records = moved, "memtable flushed at capacity");
            }
        }
        let horizon = self.conflict_horizon();
        let mut pruned = 0;
        for table in tables.values_mut() {
            let before = table.last_write.len();
            table.last_write.retain(|_, written| *written > horizon);
            pruned += before - table.last_write.len();
        }
        trace!(seq, horizon, pruned, "conflict log pruned");
        Ok(())
    }
}

impl KvStore for MemStore {
    type Txn = MemTxn;

    fn begin(&self) -> Result<MemTxn, EngineError> {
        Ok(MemTxn::new(Arc::clone(&self.inner)))
    }

    fn approximate_memtable_stats(
        &self,
        ns: &Namespace,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<MemTableStats, EngineError> {
        self.inner.with_table(ns, |table| {
            let mut stats = MemTableStats::default();
            if range_is_empty(lower, upper) {
                return stats;
            }
            for (key, slot) in table.memtable.range::<[u8], _>((lower, upper)) {
                let value = slot.as_deref().unwrap_or_default();
                stats.count += 1;
                stats.size += self.record_size(key, value);
            }
            stats
        })
    }

    fn approximate_size(
        &self,
        ns: &Namespace,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<u64, EngineError> {
        self.inner.with_table(ns, |table| {
            if range_is_empty(lower, upper) {
                return 0;
            }
            table
                .flushed
                .range::<[u8], _>((lower, upper))
                .map(|(key, value)| self.record_size(key, value))
                .sum()
        })
    }
}
