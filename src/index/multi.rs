use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use tracing::{debug, trace};

use super::codec::{self, PairCodec, EMPTY_VALUE};
use super::cursor::{Decoder, IndexCursor, Positioning, Stride};
use super::metrics::{default_metrics, IndexMetrics};
use super::options::IndexOptions;
use super::stats::IndexStats;
use super::MultiValuedIndex;
use crate::error::{IndexError, Result};
use crate::primitives::bytes::ByteCodec;
use crate::storage::engine::{KvIterator, KvStore, KvTransaction, Namespace};
use crate::txn::{with_transaction, TxContext};

/// Multi-valued index stored in one engine namespace.
///
/// Every call takes the caller's [`TxContext`]; with no active transaction
/// the call runs in its own auto-committed one.
pub struct MultiIndex<S, K, V> {
    name: String,
    store: Arc<S>,
    ns: Namespace,
    codec: PairCodec<K, V>,
    options: IndexOptions,
    metrics: Arc<dyn IndexMetrics>,
}

impl<S, K, V> fmt::Debug for MultiIndex<S, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiIndex")
            .field("name", &self.name)
            .field("namespace", &self.ns)
            .field("options", &self.options)
            .finish()
    }
}

impl<S, K, V> MultiIndex<S, K, V>
where
    S: KvStore,
    K: 'static,
    V: 'static,
{
    /// Binds an index named `name` to namespace `ns` of `store`.
    pub fn new(
        name: &str,
        store: Arc<S>,
        ns: Namespace,
        keys: Arc<dyn ByteCodec<K>>,
        values: Arc<dyn ByteCodec<V>>,
        options: IndexOptions,
    ) -> Self {
        Self::with_codec(name, store, ns, PairCodec::new(keys, values), options)
    }

    pub(crate) fn with_codec(
        name: &str,
        store: Arc<S>,
        ns: Namespace,
        codec: PairCodec<K, V>,
        options: IndexOptions,
    ) -> Self {
        let metrics = options.metrics.clone().unwrap_or_else(default_metrics);
        debug!(index = name, namespace = %ns, layout = ?codec.layout(), "index bound to namespace");
        Self {
            name: name.to_owned(),
            store,
            ns,
            codec,
            options,
            metrics,
        }
    }

    /// No-op; the engine needs no explicit open step.
    pub fn open(&self) {}

    /// No-op; cursors own their engine resources.
    pub fn close(&self) {}

    /// Always `true` once constructed.
    pub fn is_open(&self) -> bool {
        true
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace holding the entries.
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Key/value codec of the index.
    pub fn codec(&self) -> &PairCodec<K, V> {
        &self.codec
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn metrics(&self) -> &dyn IndexMetrics {
        self.metrics.as_ref()
    }

    /// Adds `(key, value)`.
    pub fn add_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        with_transaction(self.store(), ctx, |tx| self.put_in(tx, key, value))?;
        self.metrics.entry_added();
        Ok(())
    }

    /// Removes `(key, value)`; absent pairs are ignored.
    pub fn remove_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        if with_transaction(self.store(), ctx, |tx| self.delete_in(tx, key, value))? {
            self.metrics.entry_removed(1);
        }
        Ok(())
    }

    /// Removes every value of `key` and returns how many entries went.
    ///
    /// The doomed keys are collected from one iterator view first and then
    /// deleted, so the result does not depend on whether the engine's
    /// iterators observe the transaction's own deletes.
    pub fn remove_all_entries(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        let removed = with_transaction(self.store(), ctx, |tx| {
            Ok(self.remove_all_in(tx, key)?.len() as u64)
        })?;
        self.metrics.entry_removed(removed);
        Ok(removed)
    }

    /// Smallest value of `key`, [`IndexError::NotFound`] when it has none.
    pub fn find_first(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<V> {
        let (lower, upper) = self.key_bounds(key)?;
        let physical = with_transaction(self.store(), ctx, |tx| {
            let mut iter = tx.iterator(&self.ns, Bound::Included(lower), upper)?;
            iter.seek_to_first();
            iter.status()?;
            Ok(iter.key().map(<[u8]>::to_vec))
        })?;
        match physical {
            Some(physical) => self.codec.decode_value(&physical),
            None => Err(IndexError::NotFound),
        }
    }

    /// Cursor over the values of `key`, seekable by value.
    pub fn find(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<IndexCursor<V>> {
        let layout = self.codec.layout();
        let key_bytes = self.codec.key_bytes(key);
        let lower = layout.lower_bound(&key_bytes)?;
        let upper = layout.upper_bound(&key_bytes)?;
        let iter = self.open_iterator(ctx, Bound::Included(lower), upper)?;
        let seek_codec = self.codec.clone();
        let positioning = Positioning::Exact(Box::new(move |value: &V| {
            layout.encode_pair(&key_bytes, &seek_codec.value_bytes(value))
        }));
        Ok(self.cursor(iter, self.value_decoder(), positioning, Stride::PerEntry))
    }

    /// Cursor yielding the key of every entry, duplicates included.
    ///
    /// Seeking by key lands on the key's first entry.
    pub fn scan_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        self.key_cursor(ctx, Stride::PerEntry)
    }

    /// Same as [`MultiIndex::scan_keys`]; names the per-entry semantics explicitly.
    pub fn scan_physical_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        self.scan_keys(ctx)
    }

    /// Cursor yielding each key once, skipping over its remaining values.
    pub fn scan_distinct_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        self.key_cursor(ctx, Stride::DistinctKeys(self.codec.layout()))
    }

    /// Cursor yielding the value of every entry.
    ///
    /// [`IndexCursor::seek`] fails with [`IndexError::UnsupportedPositioning`]:
    /// a value alone does not identify a physical key.
    pub fn scan_values(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<V>> {
        let iter = self.open_iterator(
            ctx,
            Bound::Included(codec::global_lower_bound()),
            codec::global_upper_bound(),
        )?;
        let positioning = Positioning::Unsupported("value cursors cannot rebuild the owning key");
        Ok(self.cursor(iter, self.value_decoder(), positioning, Stride::PerEntry))
    }

    /// Number of entries. Scans the whole index.
    pub fn count(&self, ctx: &TxContext<S::Txn>) -> Result<u64> {
        self.scan_keys(ctx)?.count()
    }

    /// Number of values of `key`. Scans the key's range.
    pub fn count_key(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        self.find(ctx, key)?.count()
    }

    /// Physical `[lower, upper)` range of `key`'s entries.
    pub fn key_bounds(&self, key: &K) -> Result<(Vec<u8>, Bound<Vec<u8>>)> {
        Ok((self.codec.lower_bound(key)?, self.codec.upper_bound(key)?))
    }

    /// Approximate number of entries between two physical keys.
    ///
    /// Unflushed entries are counted from the engine's in-memory statistics;
    /// the flushed byte size is divided by the in-memory average entry size.
    /// Without an in-memory sample the configured fallback size is used, and
    /// a non-empty flushed range never reports zero.
    pub fn estimate_range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<u64> {
        let memtable = self
            .store
            .approximate_memtable_stats(&self.ns, lower, upper)?;
        let flushed = self.store.approximate_size(&self.ns, lower, upper)?;
        self.metrics.estimate_computed();
        let estimate = if memtable.count > 0 {
            let average = (memtable.size / memtable.count).max(1);
            memtable.count.saturating_add(flushed / average)
        } else if flushed == 0 {
            0
        } else {
            debug!(
                index = %self.name,
                flushed,
                fallback = self.options.fallback_record_size,
                "no in-memory sample, using fallback record size"
            );
            (flushed / self.options.fallback_record_size.max(1)).max(1)
        };
        trace!(index = %self.name, memtable = memtable.count, flushed, estimate, "range estimated");
        Ok(estimate)
    }

    /// Approximate number of entries in the whole index.
    pub fn estimate_index_size(&self) -> Result<u64> {
        let lower = codec::global_lower_bound();
        let upper = codec::global_upper_bound();
        self.estimate_range(
            Bound::Included(lower.as_slice()),
            upper.as_ref().map(Vec::as_slice),
        )
    }

    /// Statistics provider reading through `ctx`.
    pub fn stats(&self, ctx: &TxContext<S::Txn>) -> IndexStats<'_, Self, K, V>
    where
        S::Txn: 'static,
    {
        IndexStats::new(self, ctx)
    }

    pub(crate) fn put_in(&self, tx: &S::Txn, key: &K, value: &V) -> Result<()> {
        let physical = self.codec.encode_pair(key, value)?;
        tx.put(&self.ns, &physical, EMPTY_VALUE)?;
        Ok(())
    }

    /// Deletes `(key, value)` within `tx`, returning whether it was present.
    pub(crate) fn delete_in(&self, tx: &S::Txn, key: &K, value: &V) -> Result<bool> {
        let physical = self.codec.encode_pair(key, value)?;
        if tx.get(&self.ns, &physical)?.is_none() {
            return Ok(false);
        }
        tx.delete(&self.ns, &physical)?;
        Ok(true)
    }

    /// Deletes every entry of `key` within `tx` and returns the removed
    /// physical keys.
    pub(crate) fn remove_all_in(&self, tx: &S::Txn, key: &K) -> Result<Vec<Vec<u8>>> {
        let (lower, upper) = self.key_bounds(key)?;
        let doomed = {
            let mut iter = tx.iterator(&self.ns, Bound::Included(lower), upper)?;
            collect_keys(iter.as_mut())?
        };
        for physical in &doomed {
            tx.delete(&self.ns, physical)?;
        }
        debug!(index = %self.name, removed = doomed.len(), "removed all entries of key");
        Ok(doomed)
    }

    fn open_iterator(
        &self,
        ctx: &TxContext<S::Txn>,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<Box<dyn KvIterator>> {
        with_transaction(self.store(), ctx, |tx| Ok(tx.iterator(&self.ns, lower, upper)?))
    }

    fn key_cursor(&self, ctx: &TxContext<S::Txn>, stride: Stride) -> Result<IndexCursor<K>> {
        let iter = self.open_iterator(
            ctx,
            Bound::Included(codec::global_lower_bound()),
            codec::global_upper_bound(),
        )?;
        let seek_codec = self.codec.clone();
        let positioning = Positioning::KeyGroup(Box::new(move |key: &K| seek_codec.lower_bound(key)));
        let decode_codec = self.codec.clone();
        let decode: Decoder<K> = Box::new(move |physical| decode_codec.decode_key(physical));
        Ok(self.cursor(iter, decode, positioning, stride))
    }

    fn value_decoder(&self) -> Decoder<V> {
        let codec = self.codec.clone();
        Box::new(move |physical| codec.decode_value(physical))
    }

    fn cursor<T>(
        &self,
        iter: Box<dyn KvIterator>,
        decode: Decoder<T>,
        positioning: Positioning<T>,
        stride: Stride,
    ) -> IndexCursor<T> {
        IndexCursor::new(iter, decode, positioning, stride, Arc::clone(&self.metrics))
    }
}

fn collect_keys(iter: &mut dyn KvIterator) -> Result<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    iter.seek_to_first();
    while let Some(key) = iter.key() {
        keys.push(key.to_vec());
        iter.next();
    }
    iter.status()?;
    Ok(keys)
}

impl<S, K, V> MultiValuedIndex<K, V> for MultiIndex<S, K, V>
where
    S: KvStore,
    K: 'static,
    V: 'static,
{
    type Txn = S::Txn;

    fn name(&self) -> &str {
        MultiIndex::name(self)
    }

    fn add_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        MultiIndex::add_entry(self, ctx, key, value)
    }

    fn remove_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        MultiIndex::remove_entry(self, ctx, key, value)
    }

    fn remove_all_entries(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        MultiIndex::remove_all_entries(self, ctx, key)
    }

    fn find_first(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<V> {
        MultiIndex::find_first(self, ctx, key)
    }

    fn find(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<IndexCursor<V>> {
        MultiIndex::find(self, ctx, key)
    }

    fn scan_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        MultiIndex::scan_keys(self, ctx)
    }

    fn scan_distinct_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        MultiIndex::scan_distinct_keys(self, ctx)
    }

    fn scan_values(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<V>> {
        MultiIndex::scan_values(self, ctx)
    }

    fn count(&self, ctx: &TxContext<S::Txn>) -> Result<u64> {
        MultiIndex::count(self, ctx)
    }

    fn count_key(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        MultiIndex::count_key(self, ctx, key)
    }

    fn key_bounds(&self, key: &K) -> Result<(Vec<u8>, Bound<Vec<u8>>)> {
        MultiIndex::key_bounds(self, key)
    }

    fn estimate_range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<u64> {
        MultiIndex::estimate_range(self, lower, upper)
    }

    fn estimate_index_size(&self) -> Result<u64> {
        MultiIndex::estimate_index_size(self)
    }
}
