use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use super::codec::{Layout, PairCodec};
use super::cursor::IndexCursor;
use super::multi::MultiIndex;
use super::options::IndexOptions;
use super::stats::IndexStats;
use super::{MultiValuedIndex, ReverseLookup};
use crate::error::Result;
use crate::primitives::bytes::ByteCodec;
use crate::storage::engine::{KvStore, Namespace};
use crate::txn::{with_transaction, TxContext};

/// Multi-valued index that also maps each value back to its keys.
///
/// The forward mapping lives in one namespace and the reverse mapping, with
/// key and value swapped, in a second one. Both are written in the same
/// transaction. The reverse mapping groups by value under
/// [`Layout::Wide`], so values are not subject to the 255-byte key limit.
#[derive(Debug)]
pub struct BidirectionalIndex<S, K, V> {
    forward: MultiIndex<S, K, V>,
    reverse: MultiIndex<S, V, K>,
}

impl<S, K, V> BidirectionalIndex<S, K, V>
where
    S: KvStore,
    K: 'static,
    V: 'static,
{
    /// Binds the index to `forward_ns` and `reverse_ns` of `store`.
    pub fn new(
        name: &str,
        store: Arc<S>,
        forward_ns: Namespace,
        reverse_ns: Namespace,
        keys: Arc<dyn ByteCodec<K>>,
        values: Arc<dyn ByteCodec<V>>,
        options: IndexOptions,
    ) -> Self {
        let reverse_name = format!("{name}.reverse");
        let reverse = MultiIndex::with_codec(
            &reverse_name,
            Arc::clone(&store),
            reverse_ns,
            PairCodec::with_layout(Layout::Wide, Arc::clone(&values), Arc::clone(&keys)),
            options.clone(),
        );
        let forward = MultiIndex::new(name, store, forward_ns, keys, values, options);
        Self { forward, reverse }
    }

    /// The value-to-key half, for direct scans.
    pub fn reverse(&self) -> &MultiIndex<S, V, K> {
        &self.reverse
    }

    /// The key-to-value half.
    pub fn forward(&self) -> &MultiIndex<S, K, V> {
        &self.forward
    }

    /// Index name.
    pub fn name(&self) -> &str {
        self.forward.name()
    }

    /// Opens both halves.
    pub fn open(&self) {
        self.forward.open();
        self.reverse.open();
    }

    /// Closes both halves.
    pub fn close(&self) {
        self.forward.close();
        self.reverse.close();
    }

    /// Whether both halves are open.
    pub fn is_open(&self) -> bool {
        self.forward.is_open() && self.reverse.is_open()
    }

    /// Adds `(key, value)` in both directions.
    pub fn add_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        with_transaction(self.forward.store(), ctx, |tx| {
            self.forward.put_in(tx, key, value)?;
            self.reverse.put_in(tx, value, key)
        })?;
        self.forward.metrics().entry_added();
        Ok(())
    }

    /// Removes `(key, value)` from both directions.
    pub fn remove_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        let removed = with_transaction(self.forward.store(), ctx, |tx| {
            let removed = self.forward.delete_in(tx, key, value)?;
            self.reverse.delete_in(tx, value, key)?;
            Ok(removed)
        })?;
        if removed {
            self.forward.metrics().entry_removed(1);
        }
        Ok(())
    }

    /// Removes every value of `key` along with the matching reverse entries.
    pub fn remove_all_entries(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        let removed = with_transaction(self.forward.store(), ctx, |tx| {
            let doomed = self.forward.remove_all_in(tx, key)?;
            for physical in &doomed {
                let value = self.forward.codec().decode_value(physical)?;
                self.reverse.delete_in(tx, &value, key)?;
            }
            Ok(doomed.len() as u64)
        })?;
        self.forward.metrics().entry_removed(removed);
        debug!(index = %self.name(), removed, "removed reverse entries");
        Ok(removed)
    }

    /// Cursor over the keys holding `value`.
    pub fn find_by_value(&self, ctx: &TxContext<S::Txn>, value: &V) -> Result<IndexCursor<K>> {
        self.reverse.find(ctx, value)
    }

    /// Statistics provider reading through `ctx`.
    pub fn stats(&self, ctx: &TxContext<S::Txn>) -> IndexStats<'_, Self, K, V>
    where
        S::Txn: 'static,
    {
        IndexStats::new(self, ctx)
    }
}

impl<S, K, V> ReverseLookup<K, V> for BidirectionalIndex<S, K, V>
where
    S: KvStore,
    K: 'static,
    V: 'static,
{
    type Txn = S::Txn;

    fn find_by_value(&self, ctx: &TxContext<S::Txn>, value: &V) -> Result<IndexCursor<K>> {
        BidirectionalIndex::find_by_value(self, ctx, value)
    }
}

impl<S, K, V> MultiValuedIndex<K, V> for BidirectionalIndex<S, K, V>
where
    S: KvStore,
    K: 'static,
    V: 'static,
{
    type Txn = S::Txn;

    fn name(&self) -> &str {
        BidirectionalIndex::name(self)
    }

    fn add_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        BidirectionalIndex::add_entry(self, ctx, key, value)
    }

    fn remove_entry(&self, ctx: &TxContext<S::Txn>, key: &K, value: &V) -> Result<()> {
        BidirectionalIndex::remove_entry(self, ctx, key, value)
    }

    fn remove_all_entries(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        BidirectionalIndex::remove_all_entries(self, ctx, key)
    }

    fn find_first(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<V> {
        self.forward.find_first(ctx, key)
    }

    fn find(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<IndexCursor<V>> {
        self.forward.find(ctx, key)
    }

    fn scan_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        self.forward.scan_keys(ctx)
    }

    fn scan_distinct_keys(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<K>> {
        self.forward.scan_distinct_keys(ctx)
    }

    fn scan_values(&self, ctx: &TxContext<S::Txn>) -> Result<IndexCursor<V>> {
        self.forward.scan_values(ctx)
    }

    fn count(&self, ctx: &TxContext<S::Txn>) -> Result<u64> {
        self.forward.count(ctx)
    }

    fn count_key(&self, ctx: &TxContext<S::Txn>, key: &K) -> Result<u64> {
        self.forward.count_key(ctx, key)
    }

    fn key_bounds(&self, key: &K) -> Result<(Vec<u8>, Bound<Vec<u8>>)> {
        self.forward.key_bounds(key)
    }

    fn estimate_range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<u64> {
        self.forward.estimate_range(lower, upper)
    }

    fn estimate_index_size(&self) -> Result<u64> {
        self.forward.estimate_index_size()
    }

    fn reverse_lookup(&self) -> Option<&dyn ReverseLookup<K, V, Txn = S::Txn>> {
        Some(self)
    }
}
