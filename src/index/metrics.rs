use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer for index operations.
///
/// Implementations must be cheap; callbacks run inline on the caller's thread.
pub trait IndexMetrics: Send + Sync {
    /// An entry write was issued.
    fn entry_added(&self);

    /// `count` entries that were present got removed.
    fn entry_removed(&self, count: u64);

    /// A cursor took ownership of an engine iterator.
    fn cursor_opened(&self);

    /// A cursor released its engine iterator.
    fn cursor_closed(&self);

    /// A full scan drained `items` items.
    fn scan_completed(&self, items: u64);

    /// An approximate cardinality was computed from engine statistics.
    fn estimate_computed(&self);
}

/// Discards every observation.
#[derive(Default)]
pub struct NoopMetrics;

impl IndexMetrics for NoopMetrics {
    fn entry_added(&self) {}
    fn entry_removed(&self, _count: u64) {}
    fn cursor_opened(&self) {}
    fn cursor_closed(&self) {}
    fn scan_completed(&self, _items: u64) {}
    fn estimate_computed(&self) {}
}

/// Atomic counters for every observation.
#[derive(Default)]
pub struct CounterMetrics {
    /// Entry writes issued.
    pub entries_added: AtomicU64,
    /// Entries removed; deletes of absent pairs are not counted.
    pub entries_removed: AtomicU64,
    /// Cursors opened.
    pub cursors_opened: AtomicU64,
    /// Cursors closed.
    pub cursors_closed: AtomicU64,
    /// Full scans completed.
    pub scans: AtomicU64,
    /// Items produced by completed full scans.
    pub scanned_items: AtomicU64,
    /// Estimates computed.
    pub estimates: AtomicU64,
}

impl CounterMetrics {
    /// Cursors opened and not yet closed.
    pub fn open_cursors(&self) -> u64 {
        let opened = self.cursors_opened.load(Ordering::Acquire);
        let closed = self.cursors_closed.load(Ordering::Acquire);
        opened.saturating_sub(closed)
    }
}

impl IndexMetrics for CounterMetrics {
    fn entry_added(&self) {
        self.entries_added.fetch_add(1, Ordering::Relaxed);
    }

    fn entry_removed(&self, count: u64) {
        self.entries_removed.fetch_add(count, Ordering::Relaxed);
    }

    fn cursor_opened(&self) {
        self.cursors_opened.fetch_add(1, Ordering::AcqRel);
    }

    fn cursor_closed(&self) {
        self.cursors_closed.fetch_add(1, Ordering::AcqRel);
    }

    fn scan_completed(&self, items: u64) {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.scanned_items.fetch_add(items, Ordering::Relaxed);
    }

    fn estimate_computed(&self) {
        self.estimates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the metrics used when none are configured.
pub fn default_metrics() -> Arc<dyn IndexMetrics> {
    Arc::new(NoopMetrics)
}
