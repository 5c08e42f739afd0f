//! Physical key layout for multi-valued indexes.
//!
//! Every `(key, value)` pair is stored as one engine key with an empty engine
//! value:
//!
//! ```text
//! [key_len: u8][key bytes: key_len][value bytes: remainder]
//! ```
//!
//! Byte order therefore groups entries by key length, then key bytes, then
//! value bytes. All entries of a key share the prefix `[key_len][key]`, which
//! is what the range bounds below are built from. [`Layout::Wide`] is the
//! same shape with a four byte big-endian length.

use std::ops::Bound;
use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::primitives::bytes::{ord, ByteCodec};

/// Longest encoded key the one-byte length prefix can describe.
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Placeholder stored in the engine's value slot.
pub const EMPTY_VALUE: &[u8] = &[];

/// Width of the length prefix in front of the grouping key.
///
/// [`Layout::Compact`] is the index layout proper. [`Layout::Wide`] lifts the
/// 255-byte limit on the grouping key and is used where that key is an
/// arbitrary logical value, as in the reverse half of a bidirectional index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    /// `[key_len: u8][key][value]`.
    Compact,
    /// `[key_len: u32 big-endian][key][value]`.
    Wide,
}

impl Layout {
    fn prefix_len(self) -> usize {
        match self {
            Layout::Compact => 1,
            Layout::Wide => 4,
        }
    }

    /// Longest grouping key the prefix can describe.
    pub fn max_key_len(self) -> usize {
        match self {
            Layout::Compact => MAX_KEY_LEN,
            Layout::Wide => u32::MAX as usize,
        }
    }

    /// Physical key of `key`/`value`.
    pub fn encode_pair(self, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let mut out = self.lower_bound(key)?;
        out.extend_from_slice(value);
        Ok(out)
    }

    /// Smallest physical key carrying `key`: the pair with an empty value.
    pub fn lower_bound(self, key: &[u8]) -> Result<Vec<u8>> {
        let too_long = || {
            IndexError::encoding(format!(
                "index key is {} bytes, limit is {}",
                key.len(),
                self.max_key_len()
            ))
        };
        let mut out = Vec::with_capacity(self.prefix_len() + key.len());
        match self {
            Layout::Compact => out.push(u8::try_from(key.len()).map_err(|_| too_long())?),
            Layout::Wide => {
                let len = u32::try_from(key.len()).map_err(|_| too_long())?;
                out.extend_from_slice(&ord::u32_be(len));
            }
        }
        out.extend_from_slice(key);
        Ok(out)
    }

    /// Exclusive upper bound of all physical keys carrying `key`.
    ///
    /// The `[len][key]` prefix is incremented rather than padded, so the bound
    /// sits below the next key of the same length. A prefix of only `0xff`
    /// bytes has no finite successor and yields `Unbounded`.
    pub fn upper_bound(self, key: &[u8]) -> Result<Bound<Vec<u8>>> {
        Ok(prefix_successor(self.lower_bound(key)?).map_or(Bound::Unbounded, Bound::Excluded))
    }

    /// Splits a physical key into its key and value portions.
    pub fn split(self, physical: &[u8]) -> Result<(&[u8], &[u8])> {
        let prefix = self.prefix_len();
        if physical.len() < prefix {
            return Err(IndexError::encoding(format!(
                "physical key of {} bytes has no {prefix} byte length prefix",
                physical.len()
            )));
        }
        let (head, rest) = physical.split_at(prefix);
        let len = match self {
            Layout::Compact => usize::from(head[0]),
            Layout::Wide => ord::get_u32_be(head)
                .and_then(|len| usize::try_from(len).ok())
                .ok_or_else(|| IndexError::encoding("unreadable key length prefix"))?,
        };
        if rest.len() < len {
            return Err(IndexError::encoding(format!(
                "physical key declares {len} key bytes but carries {}",
                rest.len()
            )));
        }
        Ok(rest.split_at(len))
    }

    /// Bounds of the key group `physical` belongs to.
    pub(crate) fn group_bounds(self, physical: &[u8]) -> Result<(Vec<u8>, Bound<Vec<u8>>)> {
        let (key, _) = self.split(physical)?;
        Ok((self.lower_bound(key)?, self.upper_bound(key)?))
    }
}

/// Builds the physical key for `key`/`value`.
pub fn encode_pair(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    Layout::Compact.encode_pair(key, value)
}

/// Smallest physical key carrying `key`: the pair with an empty value.
pub fn lower_bound(key: &[u8]) -> Result<Vec<u8>> {
    Layout::Compact.lower_bound(key)
}

/// Exclusive upper bound of all physical keys carrying `key`.
///
/// Only the all-`0xff` 255-byte key has no finite successor and yields
/// `Unbounded`.
pub fn upper_bound(key: &[u8]) -> Result<Bound<Vec<u8>>> {
    Layout::Compact.upper_bound(key)
}

/// Lower bound of a whole-index scan.
pub fn global_lower_bound() -> Vec<u8> {
    Vec::new()
}

/// Upper bound of a whole-index scan.
pub fn global_upper_bound() -> Bound<Vec<u8>> {
    Bound::Unbounded
}

/// Splits a physical key into its key and value portions.
pub fn split(physical: &[u8]) -> Result<(&[u8], &[u8])> {
    Layout::Compact.split(physical)
}

fn prefix_successor(mut prefix: Vec<u8>) -> Option<Vec<u8>> {
    while let Some(last) = prefix.pop() {
        if last < u8::MAX {
            prefix.push(last + 1);
            return Some(prefix);
        }
    }
    None
}

/// Typed front end over a [`Layout`], bound to an index's key and value codecs.
pub struct PairCodec<K, V> {
    layout: Layout,
    keys: Arc<dyn ByteCodec<K>>,
    values: Arc<dyn ByteCodec<V>>,
}

impl<K, V> Clone for PairCodec<K, V> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout,
            keys: Arc::clone(&self.keys),
            values: Arc::clone(&self.values),
        }
    }
}

impl<K, V> PairCodec<K, V> {
    /// Creates a codec over the compact layout.
    pub fn new(keys: Arc<dyn ByteCodec<K>>, values: Arc<dyn ByteCodec<V>>) -> Self {
        Self::with_layout(Layout::Compact, keys, values)
    }

    /// Creates a codec over `layout`.
    pub fn with_layout(
        layout: Layout,
        keys: Arc<dyn ByteCodec<K>>,
        values: Arc<dyn ByteCodec<V>>,
    ) -> Self {
        Self {
            layout,
            keys,
            values,
        }
    }

    /// Physical layout in use.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Logical key bytes.
    pub fn key_bytes(&self, key: &K) -> Vec<u8> {
        self.keys.to_bytes(key)
    }

    /// Logical value bytes.
    pub fn value_bytes(&self, value: &V) -> Vec<u8> {
        self.values.to_bytes(value)
    }

    /// Physical key of `(key, value)`.
    pub fn encode_pair(&self, key: &K, value: &V) -> Result<Vec<u8>> {
        self.layout
            .encode_pair(&self.keys.to_bytes(key), &self.values.to_bytes(value))
    }

    /// Inclusive lower bound of `key`'s entries.
    pub fn lower_bound(&self, key: &K) -> Result<Vec<u8>> {
        self.layout.lower_bound(&self.keys.to_bytes(key))
    }

    /// Exclusive upper bound of `key`'s entries.
    pub fn upper_bound(&self, key: &K) -> Result<Bound<Vec<u8>>> {
        self.layout.upper_bound(&self.keys.to_bytes(key))
    }

    /// Decodes the key portion of a physical key.
    pub fn decode_key(&self, physical: &[u8]) -> Result<K> {
        let (key, value) = self.layout.split(physical)?;
        let offset = physical.len() - value.len() - key.len();
        self.keys.from_bytes(physical, offset, key.len())
    }

    /// Decodes the value portion of a physical key.
    pub fn decode_value(&self, physical: &[u8]) -> Result<V> {
        let (_, value) = self.layout.split(physical)?;
        self.values
            .from_bytes(physical, physical.len() - value.len(), value.len())
    }
}
