//! Minimal big-endian integer payloads.
//!
//! Two flavors share this module: unsigned magnitudes (integer and
//! nanosecond payloads) and two's complement (timestamp seconds). Both are
//! minimal on the wire — zero encodes as the empty payload, magnitudes carry
//! no leading zero octet, and two's complement carries no redundant sign
//! octet. Decoding rejects non-minimal forms rather than normalizing them,
//! so one value has exactly one encoding.

use crate::{Error, Result};

/// Encodes a `u64` magnitude, returning the full big-endian array and the
/// count of significant octets (the payload is the trailing `n` octets).
#[inline]
pub(crate) fn unsigned_bytes(value: u64) -> ([u8; 8], usize) {
    let n = (64 - value.leading_zeros() as usize + 7) / 8;
    (value.to_be_bytes(), n)
}

/// Decodes a minimal big-endian magnitude.
pub(crate) fn read_unsigned(payload: &[u8]) -> Result<u64> {
    if payload.len() > 8 {
        return Err(Error::OutOfRange);
    }
    if payload.first() == Some(&0) {
        return Err(Error::NonMinimalInt);
    }
    let mut value = 0u64;
    for &b in payload {
        value = value << 8 | u64::from(b);
    }
    Ok(value)
}

/// Encodes an `i64` as minimal big-endian two's complement.
///
/// Leading `0x00` octets are dropped while the next octet keeps the sign bit
/// clear; leading `0xff` octets are dropped while the next octet keeps it
/// set. Zero encodes as the empty payload.
#[inline]
pub(crate) fn signed_bytes(value: i64) -> ([u8; 8], usize) {
    let be = value.to_be_bytes();
    let mut n = 8;
    while n > 1 {
        let lead = be[8 - n];
        let next = be[8 - n + 1];
        if (lead == 0x00 && next & 0x80 == 0) || (lead == 0xff && next & 0x80 != 0) {
            n -= 1;
        } else {
            break;
        }
    }
    if n == 1 && be[7] == 0 {
        n = 0;
    }
    (be, n)
}

/// Decodes minimal big-endian two's complement into an `i64`.
pub(crate) fn read_signed(payload: &[u8]) -> Result<i64> {
    let Some((&first, rest)) = payload.split_first() else {
        return Ok(0);
    };
    if payload.len() > 8 {
        return Err(Error::OutOfRange);
    }
    if let Some(&next) = rest.first() {
        if (first == 0x00 && next & 0x80 == 0) || (first == 0xff && next & 0x80 != 0) {
            return Err(Error::NonMinimalInt);
        }
    } else if first == 0 {
        // Zero must be the empty payload.
        return Err(Error::NonMinimalInt);
    }
    let mut value = if first & 0x80 != 0 { -1i64 } else { 0 };
    for &b in payload {
        value = value << 8 | i64::from(b);
    }
    Ok(value)
}
