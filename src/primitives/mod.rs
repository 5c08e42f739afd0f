//! Low-level primitives shared by the storage and index layers.

/// Byte-level encodings for logical keys and values.
pub mod bytes;
