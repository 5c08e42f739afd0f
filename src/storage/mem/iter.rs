use std::sync::Arc;

use super::StoreInner;
use crate::storage::engine::{EngineError, KvIterator};

/// Iterator over a materialised read view of one namespace range.
pub struct MemIterator {
    store: Arc<StoreInner>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl MemIterator {
    pub(crate) fn new(store: Arc<StoreInner>, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        store.iterator_opened();
        Self {
            store,
            entries,
            pos: None,
        }
    }

    /// Value of the current entry.
    pub fn value(&self) -> Option<&[u8]> {
        self.pos.map(|pos| self.entries[pos].1.as_slice())
    }
}

impl KvIterator for MemIterator {
    fn seek_to_first(&mut self) {
        self.pos = (!self.entries.is_empty()).then_some(0);
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn seek(&mut self, target: &[u8]) {
        let idx = self
            .entries
            .partition_point(|(key, _)| key.as_slice() < target);
        self.pos = (idx < self.entries.len()).then_some(idx);
    }

    fn next(&mut self) {
        self.pos = self
            .pos
            .map(|pos| pos + 1)
            .filter(|&pos| pos < self.entries.len());
    }

    fn prev(&mut self) {
        self.pos = self.pos.and_then(|pos| pos.checked_sub(1));
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> Option<&[u8]> {
        self.pos.map(|pos| self.entries[pos].0.as_slice())
    }

    fn status(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

impl Drop for MemIterator {
    fn drop(&mut self) {
        self.store.iterator_closed();
    }
}
