//! Cost-bounded cardinality statistics.
//!
//! Callers state how much work they accept ([`MaxCost`]) and whether an
//! approximation will do. Each query either returns a deferred [`Count`]
//! or `None` when no answer fits the budget. The statistics layer never
//! forces a `Count` itself: a caller that only inspects
//! [`Count::is_estimate`] pays for no scan.
//!
//! | query | bounded, estimate ok | bounded, exact only | unbounded |
//! |---|---|---|---|
//! | entries | estimate of whole index | `None` | exact scan |
//! | keys | `None` | `None` | exact distinct-key scan |
//! | values of key | estimate of key range | `None` | exact key scan |
//! | values | `None` | `None` | exact scan |
//! | keys with value | reverse lookup if supported | `None` | reverse lookup if supported |

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use super::MultiValuedIndex;
use crate::error::Result;
use crate::txn::TxContext;

/// Work budget for a statistics query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaxCost {
    /// Only cheap, pre-aggregated answers. The number is advisory.
    Bounded(u64),
    /// A full scan is allowed.
    Unbounded,
}

impl MaxCost {
    /// Whether a full scan fits the budget.
    pub fn allows_scan(self) -> bool {
        matches!(self, MaxCost::Unbounded)
    }
}

impl From<u64> for MaxCost {
    fn from(cost: u64) -> Self {
        if cost == u64::MAX {
            MaxCost::Unbounded
        } else {
            MaxCost::Bounded(cost)
        }
    }
}

/// Deferred cardinality, tagged as exact or estimated.
pub struct Count<'a> {
    compute: Box<dyn FnOnce() -> Result<u64> + 'a>,
    estimate: bool,
}

impl<'a> Count<'a> {
    /// A count obtained by scanning.
    pub fn exact(compute: impl FnOnce() -> Result<u64> + 'a) -> Self {
        Self {
            compute: Box::new(compute),
            estimate: false,
        }
    }

    /// A count derived from approximate engine statistics.
    pub fn estimated(compute: impl FnOnce() -> Result<u64> + 'a) -> Self {
        Self {
            compute: Box::new(compute),
            estimate: true,
        }
    }

    /// Whether the value is an approximation.
    pub fn is_estimate(&self) -> bool {
        self.estimate
    }

    /// Runs the computation.
    pub fn value(self) -> Result<u64> {
        (self.compute)()
    }
}

impl fmt::Debug for Count<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Count")
            .field("estimate", &self.estimate)
            .finish_non_exhaustive()
    }
}

/// Statistics provider for one index under one transaction context.
pub struct IndexStats<'a, I: ?Sized, K, V>
where
    I: MultiValuedIndex<K, V>,
{
    index: &'a I,
    ctx: TxContext<I::Txn>,
    _items: PhantomData<fn(K, V)>,
}

impl<'a, I, K, V> IndexStats<'a, I, K, V>
where
    I: MultiValuedIndex<K, V> + ?Sized,
    I::Txn: 'a,
    K: 'a,
    V: 'a,
{
    /// Creates a provider reading through `ctx`.
    pub fn new(index: &'a I, ctx: &TxContext<I::Txn>) -> Self {
        Self {
            index,
            ctx: ctx.clone(),
            _items: PhantomData,
        }
    }

    /// Number of `(key, value)` entries.
    pub fn entries(&self, cost: MaxCost, estimate_ok: bool) -> Option<Count<'a>> {
        let index = self.index;
        if cost.allows_scan() {
            let ctx = self.ctx.clone();
            return Some(Count::exact(move || index.count(&ctx)));
        }
        if !estimate_ok {
            trace!(index = index.name(), "entries: exact count exceeds budget");
            return None;
        }
        Some(Count::estimated(move || index.estimate_index_size()))
    }

    /// Number of distinct keys. No estimator exists.
    pub fn keys(&self, cost: MaxCost, _estimate_ok: bool) -> Option<Count<'a>> {
        let index = self.index;
        if !cost.allows_scan() {
            trace!(index = index.name(), "keys: no estimator within budget");
            return None;
        }
        let ctx = self.ctx.clone();
        Some(Count::exact(move || index.scan_distinct_keys(&ctx)?.count()))
    }

    /// Number of values stored under `key`.
    pub fn values_of_key(&self, key: K, cost: MaxCost, estimate_ok: bool) -> Option<Count<'a>> {
        let index = self.index;
        if cost.allows_scan() {
            let ctx = self.ctx.clone();
            return Some(Count::exact(move || index.count_key(&ctx, &key)));
        }
        if !estimate_ok {
            trace!(index = index.name(), "values_of_key: exact count exceeds budget");
            return None;
        }
        Some(Count::estimated(move || {
            let (lower, upper) = index.key_bounds(&key)?;
            index.estimate_range(
                std::ops::Bound::Included(lower.as_slice()),
                upper.as_ref().map(Vec::as_slice),
            )
        }))
    }

    /// Number of values across all keys, duplicates included. No estimator exists.
    pub fn values(&self, cost: MaxCost, _estimate_ok: bool) -> Option<Count<'a>> {
        let index = self.index;
        if !cost.allows_scan() {
            trace!(index = index.name(), "values: no estimator within budget");
            return None;
        }
        let ctx = self.ctx.clone();
        Some(Count::exact(move || index.scan_values(&ctx)?.count()))
    }

    /// Number of keys holding `value`; needs the reverse-lookup capability.
    pub fn keys_with_value(&self, value: V, cost: MaxCost, estimate_ok: bool) -> Option<Count<'a>> {
        let index = self.index;
        if !cost.allows_scan() && !estimate_ok {
            return None;
        }
        let Some(reverse) = index.reverse_lookup() else {
            trace!(index = index.name(), "keys_with_value: no reverse lookup");
            return None;
        };
        let ctx = self.ctx.clone();
        Some(Count::exact(move || reverse.find_by_value(&ctx, &value)?.count()))
    }
}
