use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

use super::{range_is_empty, MemIterator, Slot, StoreInner};
use crate::storage::engine::{EngineError, KvIterator, KvTransaction, Namespace};

/// Transaction over a [`super::MemStore`].
///
/// Writes are buffered until [`KvTransaction::commit`]; reads see committed
/// data overlaid with the transaction's own writes. Dropping without
/// committing discards the writes.
pub struct MemTxn {
    store: Arc<StoreInner>,
    start_seq: u64,
    state: Mutex<TxnState>,
}

#[derive(Default)]
struct TxnState {
    writes: FxHashMap<Namespace, BTreeMap<Vec<u8>, Slot>>,
    finished: bool,
}

impl TxnState {
    fn ensure_active(&self) -> Result<(), EngineError> {
        if self.finished {
            Err(EngineError::TransactionClosed)
        } else {
            Ok(())
        }
    }
}

impl MemTxn {
    pub(crate) fn new(store: Arc<StoreInner>) -> Self {
        let start_seq = store.txn_started();
        trace!(start_seq, "transaction started");
        Self {
            store,
            start_seq,
            state: Mutex::new(TxnState::default()),
        }
    }

    /// Number of buffered writes not yet committed.
    pub fn pending_writes(&self) -> usize {
        self.state.lock().writes.values().map(BTreeMap::len).sum()
    }

    fn write(&self, ns: &Namespace, key: &[u8], slot: Slot) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.ensure_active()?;
        // Surface unknown namespaces at write time rather than at commit.
        self.store.with_table(ns, |_| ())?;
        state
            .writes
            .entry(ns.clone())
            .or_default()
            .insert(key.to_vec(), slot);
        Ok(())
    }
}

impl KvTransaction for MemTxn {
    fn get(&self, ns: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let state = self.state.lock();
        state.ensure_active()?;
        if let Some(slot) = state.writes.get(ns).and_then(|batch| batch.get(key)) {
            return Ok(slot.clone());
        }
        self.store
            .with_table(ns, |table| table.get(key).map(<[u8]>::to_vec))
    }

    fn put(&self, ns: &Namespace, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.write(ns, key, Some(value.to_vec()))
    }

    fn delete(&self, ns: &Namespace, key: &[u8]) -> Result<(), EngineError> {
        self.write(ns, key, None)
    }

    fn iterator(
        &self,
        ns: &Namespace,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<Box<dyn KvIterator>, EngineError> {
        let state = self.state.lock();
        state.ensure_active()?;
        let lo = lower.as_ref().map(Vec::as_slice);
        let hi = upper.as_ref().map(Vec::as_slice);
        let mut view = self.store.with_table(ns, |table| table.visible_range(lo, hi))?;
        if let Some(batch) = state.writes.get(ns) {
            if !range_is_empty(lo, hi) {
                for (key, slot) in batch.range::<[u8], _>((lo, hi)) {
                    match slot {
                        Some(value) => {
                            view.insert(key.clone(), value.clone());
                        }
                        None => {
                            view.remove(key);
                        }
                    }
                }
            }
        }
        Ok(Box::new(MemIterator::new(
            Arc::clone(&self.store),
            view.into_iter().collect(),
        )))
    }

    fn commit(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.ensure_active()?;
        state.finished = true;
        let writes = std::mem::take(&mut state.writes);
        let count: usize = writes.values().map(BTreeMap::len).sum();
        let applied = if count == 0 {
            Ok(())
        } else {
            self.store.apply(self.start_seq, writes)
        };
        self.store.txn_finished(self.start_seq);
        applied?;
        trace!(start_seq = self.start_seq, writes = count, "transaction committed");
        Ok(())
    }

    fn rollback(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.ensure_active()?;
        state.finished = true;
        state.writes.clear();
        self.store.txn_finished(self.start_seq);
        Ok(())
    }
}

impl Drop for MemTxn {
    fn drop(&mut self) {
        if !self.state.get_mut().finished {
            self.store.txn_finished(self.start_seq);
        }
    }
}
