//! Storage engines the indexes run on.
//!
//! [`engine`] states what an index needs from an ordered, transactional
//! key-value store; [`mem`] provides one in memory.

/// Engine contract: stores, transactions, iterators and their errors.
pub mod engine;

/// In-memory engine with LSM-style approximate statistics.
pub mod mem;
