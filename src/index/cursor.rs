//! Logical cursors over engine iterators.
//!
//! An [`IndexCursor`] owns exactly one engine iterator and decodes the
//! physical keys it visits into logical keys or values. The iterator is
//! released by [`IndexCursor::close`] or, at the latest, when the cursor is
//! dropped, so early returns and `?` propagation cannot leak it.

use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use tracing::trace;

use super::codec::Layout;
use super::metrics::IndexMetrics;
use crate::error::{IndexError, Result};
use crate::storage::engine::KvIterator;

pub(crate) type Decoder<T> = Box<dyn Fn(&[u8]) -> Result<T> + Send>;
pub(crate) type Encoder<T> = Box<dyn Fn(&T) -> Result<Vec<u8>> + Send>;

/// How a cursor maps an item back to a physical position.
pub(crate) enum Positioning<T> {
    /// The item re-encodes to its exact physical key.
    Exact(Encoder<T>),
    /// The item re-encodes to the lower bound of its key group; any entry of
    /// the group counts as a hit.
    KeyGroup(Encoder<T>),
    /// The physical key cannot be rebuilt from the item alone.
    Unsupported(&'static str),
}

/// Granularity of a cursor step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Stride {
    /// One step per physical entry.
    PerEntry,
    /// One step per key group of the given layout, skipping the group's
    /// remaining entries.
    DistinctKeys(Layout),
}

/// Observable lifecycle state of an [`IndexCursor`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorState {
    /// Created, not yet moved.
    Unopened,
    /// Resting on an item.
    Positioned,
    /// Stepped past either end of the range.
    Exhausted,
    /// Iterator released.
    Closed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Position {
    Unopened,
    At,
    PastEnd,
    BeforeStart,
    Closed,
}

/// Seekable, bidirectional cursor over decoded index items.
///
/// Items come out in physical byte order. For the values of one key that is
/// ascending order of the value encoding, which matches the values' natural
/// order only when the value codec is order-preserving.
///
/// A cursor is not meant to be shared between threads without external
/// synchronisation; it is `Send` so it can be handed over.
pub struct IndexCursor<T> {
    iter: Option<Box<dyn KvIterator>>,
    decode: Decoder<T>,
    positioning: Positioning<T>,
    stride: Stride,
    position: Position,
    metrics: Arc<dyn IndexMetrics>,
}

fn closed() -> IndexError {
    IndexError::InvalidState("cursor is closed")
}

fn lost_position() -> IndexError {
    IndexError::InvalidState("cursor lost its position")
}

impl<T> IndexCursor<T> {
    pub(crate) fn new(
        iter: Box<dyn KvIterator>,
        decode: Decoder<T>,
        positioning: Positioning<T>,
        stride: Stride,
        metrics: Arc<dyn IndexMetrics>,
    ) -> Self {
        metrics.cursor_opened();
        Self {
            iter: Some(iter),
            decode,
            positioning,
            stride,
            position: Position::Unopened,
            metrics,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CursorState {
        match self.position {
            Position::Unopened => CursorState::Unopened,
            Position::At => CursorState::Positioned,
            Position::PastEnd | Position::BeforeStart => CursorState::Exhausted,
            Position::Closed => CursorState::Closed,
        }
    }

    /// Whether the iterator has been released.
    pub fn is_closed(&self) -> bool {
        self.position == Position::Closed
    }

    /// Advances and returns the next item, `None` once past the end.
    ///
    /// On an unopened cursor, or one exhausted at the start, this yields the
    /// first item.
    pub fn next(&mut self) -> Result<Option<T>> {
        let Some(iter) = self.iter.as_deref_mut() else {
            return Err(closed());
        };
        match self.position {
            Position::Closed => return Err(closed()),
            Position::PastEnd => return Ok(None),
            Position::Unopened | Position::BeforeStart => iter.seek_to_first(),
            Position::At => match self.stride {
                Stride::PerEntry => iter.next(),
                Stride::DistinctKeys(layout) => {
                    let (_, upper) = layout.group_bounds(iter.key().ok_or_else(lost_position)?)?;
                    match upper {
                        Bound::Excluded(upper) | Bound::Included(upper) => iter.seek(&upper),
                        Bound::Unbounded => {
                            self.position = Position::PastEnd;
                            return Ok(None);
                        }
                    }
                }
            },
        }
        settle(iter, &self.decode, &mut self.position, Position::PastEnd)
    }

    /// Steps back and returns the previous item, `None` once before the start.
    ///
    /// On an unopened cursor, or one exhausted at the end, this yields the
    /// last item.
    pub fn prev(&mut self) -> Result<Option<T>> {
        let Some(iter) = self.iter.as_deref_mut() else {
            return Err(closed());
        };
        match self.position {
            Position::Closed => return Err(closed()),
            Position::BeforeStart => return Ok(None),
            Position::Unopened | Position::PastEnd => iter.seek_to_last(),
            Position::At => match self.stride {
                Stride::PerEntry => iter.prev(),
                Stride::DistinctKeys(layout) => {
                    let (lower, _) = layout.group_bounds(iter.key().ok_or_else(lost_position)?)?;
                    iter.seek(&lower);
                    iter.prev();
                }
            },
        }
        settle(iter, &self.decode, &mut self.position, Position::BeforeStart)
    }

    /// Item the cursor rests on.
    ///
    /// Fails with [`IndexError::InvalidState`] unless the cursor is positioned.
    pub fn current(&self) -> Result<T> {
        let Some(iter) = self.iter.as_deref() else {
            return Err(closed());
        };
        if self.position != Position::At {
            return Err(IndexError::InvalidState("cursor is not positioned"));
        }
        (self.decode)(iter.key().ok_or_else(lost_position)?)
    }

    /// Repositions on `item`, returning whether it exists.
    ///
    /// When it does not, the cursor rests on the next greater item (or is
    /// exhausted), so iteration resumes from there.
    pub fn seek(&mut self, item: &T) -> Result<bool> {
        let Some(iter) = self.iter.as_deref_mut() else {
            return Err(closed());
        };
        let (target, group) = match &self.positioning {
            Positioning::Exact(encode) => (encode(item)?, false),
            Positioning::KeyGroup(encode) => (encode(item)?, true),
            Positioning::Unsupported(reason) => {
                return Err(IndexError::UnsupportedPositioning(*reason));
            }
        };
        iter.seek(&target);
        iter.status()?;
        let Some(key) = iter.key() else {
            self.position = Position::PastEnd;
            return Ok(false);
        };
        self.position = Position::At;
        Ok(if group {
            key.starts_with(&target)
        } else {
            key == target.as_slice()
        })
    }

    /// Drains the remaining items, closes the cursor and returns how many
    /// there were.
    pub fn count(mut self) -> Result<u64> {
        let mut items = 0u64;
        while self.next()?.is_some() {
            items += 1;
        }
        self.metrics.scan_completed(items);
        self.close();
        Ok(items)
    }

    /// Drains the remaining items into a vector and closes the cursor.
    pub fn collect_remaining(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.next()? {
            out.push(item);
        }
        self.metrics.scan_completed(out.len() as u64);
        self.close();
        Ok(out)
    }

    /// Forward iterator adapter yielding `Result<T>` per item.
    pub fn items(self) -> CursorItems<T> {
        CursorItems {
            cursor: self,
            done: false,
        }
    }

    /// Releases the engine iterator. Idempotent.
    pub fn close(&mut self) {
        if let Some(iter) = self.iter.take() {
            drop(iter);
            self.metrics.cursor_closed();
            trace!("index cursor closed");
        }
        self.position = Position::Closed;
    }
}

fn settle<T>(
    iter: &dyn KvIterator,
    decode: &Decoder<T>,
    position: &mut Position,
    off_edge: Position,
) -> Result<Option<T>> {
    iter.status()?;
    match iter.key() {
        Some(key) => {
            *position = Position::At;
            decode(key).map(Some)
        }
        None => {
            *position = off_edge;
            Ok(None)
        }
    }
}

impl<T> Drop for IndexCursor<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for IndexCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCursor")
            .field("state", &self.state())
            .field("stride", &self.stride)
            .finish()
    }
}

/// Iterator returned by [`IndexCursor::items`]. Stops after the first error.
pub struct CursorItems<T> {
    cursor: IndexCursor<T>,
    done: bool,
}

impl<T> Iterator for CursorItems<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                self.cursor.close();
                None
            }
            Err(err) => {
                self.done = true;
                self.cursor.close();
                Some(Err(err))
            }
        }
    }
}
