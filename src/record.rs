//! # Record Codecs
//!
//! A record is a fixed layout of `[key | data]` where both widths are runtime
//! configuration. The engine never interprets those bytes itself; ordering and
//! numeric projection are supplied by the caller through the two capability
//! traits in this module, passed in at construction time.
//!
//! ## Key Codec
//!
//! `KeyCodec` provides a total order over key byte-slices plus `as_i64`, a
//! monotone numeric projection. The projection drives interpolated point
//! lookup: the engine estimates a page position from
//! `(key - min_key) / (records_per_page * avg_gap)` and corrects against the
//! first/last keys of the pages it lands on. The two methods must agree:
//! `compare(a, b)` and `as_i64(a).cmp(&as_i64(b))` must order any two keys
//! the same way, or lookups may miss records.
//!
//! ## Data Codec
//!
//! `DataCodec` provides ordering only. It backs the per-page min/max data
//! summary and the data-range predicate of scans. A codec may inspect only a
//! prefix of the data value; `U32LePrefix` orders by the leading four bytes,
//! which matches the common layout where a small measurement is followed by
//! opaque payload bytes.
//!
//! ## Provided Implementations
//!
//! - `U32LeKey`: 4-byte little-endian unsigned keys (epoch-second timestamps
//!   and the like). Shorter slices are zero-extended, which preserves order.
//! - `U32LePrefix`: orders data values by their leading 4 bytes, read as a
//!   little-endian unsigned integer.

use std::cmp::Ordering;

/// Total order plus a monotone numeric projection over key byte-slices.
pub trait KeyCodec {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Numeric projection used for interpolated page placement. Must be
    /// monotone with respect to `compare`.
    fn as_i64(&self, key: &[u8]) -> i64;
}

/// Total order over data byte-slices.
pub trait DataCodec {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

fn u32_le_prefix(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    let n = bytes.len().min(4);
    buf[..n].copy_from_slice(&bytes[..n]);
    u32::from_le_bytes(buf)
}

/// 4-byte little-endian unsigned keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct U32LeKey;

impl KeyCodec for U32LeKey {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        u32_le_prefix(a).cmp(&u32_le_prefix(b))
    }

    fn as_i64(&self, key: &[u8]) -> i64 {
        u32_le_prefix(key) as i64
    }
}

/// Orders data values by their leading 4 bytes, little-endian unsigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct U32LePrefix;

impl DataCodec for U32LePrefix {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        u32_le_prefix(a).cmp(&u32_le_prefix(b))
    }
}
