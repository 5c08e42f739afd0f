use std::fmt;
use std::sync::Arc;

use super::metrics::IndexMetrics;

/// Average entry size assumed by estimates when the in-memory sample is empty.
pub const DEFAULT_FALLBACK_RECORD_SIZE: u64 = 32;

/// Configuration supplied when constructing an index.
#[derive(Clone)]
pub struct IndexOptions {
    /// Average physical entry size, in bytes, used to turn flushed byte
    /// counts into entry counts when no in-memory sample exists.
    pub fallback_record_size: u64,
    /// Optional metrics sink.
    pub metrics: Option<Arc<dyn IndexMetrics>>,
}

impl IndexOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            fallback_record_size: DEFAULT_FALLBACK_RECORD_SIZE,
            metrics: None,
        }
    }

    /// Sets the fallback average entry size. Zero is treated as one.
    pub fn fallback_record_size(mut self, bytes: u64) -> Self {
        self.fallback_record_size = bytes.max(1);
        self
    }

    /// Installs a metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn IndexMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexOptions")
            .field("fallback_record_size", &self.fallback_record_size)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
