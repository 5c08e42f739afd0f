#![forbid(unsafe_code)]
//! Byte encodings for logical index keys and values.
//!
//! [`ByteCodec`] is the contract an index is instantiated with: one codec for
//! its key type and one for its value type. The stock codecs below cover the
//! common cases; the integer ones are order-preserving so byte order matches
//! numeric order.

use crate::error::{IndexError, Result};

pub mod ord {
    //! Order-preserving encoders for numeric keys.

    const U32_LEN: usize = core::mem::size_of::<u32>();
    const U64_LEN: usize = core::mem::size_of::<u64>();
    const SIGN_BIT: u64 = 1 << 63;

    /// Big-endian u32, used for length prefixes.
    pub fn u32_be(v: u32) -> [u8; U32_LEN] {
        v.to_be_bytes()
    }

    /// Decodes a big-endian u32; `None` unless `src` is exactly 4 bytes.
    pub fn get_u32_be(src: &[u8]) -> Option<u32> {
        let bytes: [u8; U32_LEN] = src.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Big-endian encoding for lexicographic order preservation.
    pub fn u64_be(v: u64) -> [u8; U64_LEN] {
        v.to_be_bytes()
    }

    /// Decodes a big-endian u64; `None` unless `src` is exactly 8 bytes.
    pub fn get_u64_be(src: &[u8]) -> Option<u64> {
        let bytes: [u8; U64_LEN] = src.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    /// Encodes a signed i64 with order preservation (flip sign bit for sorting).
    pub fn i64_be(v: i64) -> [u8; U64_LEN] {
        u64_be((v as u64) ^ SIGN_BIT)
    }

    /// Decodes an i64 written by [`i64_be`].
    pub fn get_i64_be(src: &[u8]) -> Option<i64> {
        get_u64_be(src).map(|flipped| (flipped ^ SIGN_BIT) as i64)
    }
}

/// Bijective conversion between a logical type and its byte representation.
pub trait ByteCodec<T>: Send + Sync {
    /// Encodes `value`.
    fn to_bytes(&self, value: &T) -> Vec<u8>;

    /// Decodes the `len` bytes of `bytes` starting at `offset`.
    fn from_bytes(&self, bytes: &[u8], offset: usize, len: usize) -> Result<T>;
}

/// Returns `bytes[offset..offset + len]`, failing instead of panicking.
pub fn window(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            IndexError::encoding(format!(
                "window {offset}+{len} exceeds {} byte buffer",
                bytes.len()
            ))
        })
}

/// Unsigned 64-bit integers as 8 big-endian bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct U64Codec;

impl ByteCodec<u64> for U64Codec {
    fn to_bytes(&self, value: &u64) -> Vec<u8> {
        ord::u64_be(*value).to_vec()
    }

    fn from_bytes(&self, bytes: &[u8], offset: usize, len: usize) -> Result<u64> {
        let src = window(bytes, offset, len)?;
        ord::get_u64_be(src)
            .ok_or_else(|| IndexError::encoding(format!("u64 needs 8 bytes, got {len}")))
    }
}

/// Signed 64-bit integers, sign bit flipped so negatives sort first.
#[derive(Clone, Copy, Debug, Default)]
pub struct I64Codec;

impl ByteCodec<i64> for I64Codec {
    fn to_bytes(&self, value: &i64) -> Vec<u8> {
        ord::i64_be(*value).to_vec()
    }

    fn from_bytes(&self, bytes: &[u8], offset: usize, len: usize) -> Result<i64> {
        let src = window(bytes, offset, len)?;
        ord::get_i64_be(src)
            .ok_or_else(|| IndexError::encoding(format!("i64 needs 8 bytes, got {len}")))
    }
}

/// UTF-8 strings, stored verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8Codec;

impl ByteCodec<String> for Utf8Codec {
    fn to_bytes(&self, value: &String) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn from_bytes(&self, bytes: &[u8], offset: usize, len: usize) -> Result<String> {
        let src = window(bytes, offset, len)?;
        String::from_utf8(src.to_vec())
            .map_err(|err| IndexError::encoding(format!("invalid UTF-8: {err}")))
    }
}

/// Opaque byte strings, stored verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCodec;

impl ByteCodec<Vec<u8>> for RawCodec {
    fn to_bytes(&self, value: &Vec<u8>) -> Vec<u8> {
        value.clone()
    }

    fn from_bytes(&self, bytes: &[u8], offset: usize, len: usize) -> Result<Vec<u8>> {
        Ok(window(bytes, offset, len)?.to_vec())
    }
}
