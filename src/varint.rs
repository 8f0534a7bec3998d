//! Variable-length 7-bit length prefixes.
//!
//! Each octet carries a continuation bit (MSB) and 7 data bits, least
//! significant group first. The last octet has continuation = 0. Declared
//! lengths are capped at 64 value bits; anything longer is malformed input,
//! not a value to be truncated.

use crate::{Error, Result};

/// Maximum encoded size of a 64-bit length prefix.
pub(crate) const MAX_LEN: usize = 10;

/// Encodes `value` into a fixed scratch array, returning the octet count.
#[inline]
pub(crate) fn encode(value: u64) -> ([u8; MAX_LEN], usize) {
    let mut out = [0u8; MAX_LEN];
    if value < 128 {
        // Fast path: single octet covers almost every real payload length.
        out[0] = value as u8;
        return (out, 1);
    }
    let mut v = value;
    let mut n = 0;
    loop {
        let low7 = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out[n] = low7;
            n += 1;
            return (out, n);
        }
        out[n] = 0x80 | low7;
        n += 1;
    }
}

/// Number of octets [`encode`] produces for `value`.
#[inline]
pub(crate) fn encoded_len(value: u64) -> usize {
    if value < 128 {
        1
    } else {
        (70 - value.leading_zeros() as usize) / 7
    }
}

/// Decodes one length prefix from the start of `buf`.
///
/// Returns the value and the octet count consumed. Fails with
/// [`Error::Truncated`] if a continuation octet has no successor and
/// [`Error::LengthOverflow`] if the value needs more than 64 bits.
#[inline]
pub(crate) fn decode(buf: &[u8]) -> Result<(u64, usize)> {
    let first = *buf.first().ok_or(Error::Truncated)?;
    if first & 0x80 == 0 {
        return Ok((u64::from(first), 1));
    }
    let mut result = u64::from(first & 0x7f);
    let mut shift: u32 = 7;
    let mut n = 1;
    loop {
        let byte = *buf.get(n).ok_or(Error::Truncated)?;
        n += 1;
        let data = u64::from(byte & 0x7f);
        // At shift 63 only data bit 0 is valid and no continuation may follow.
        if shift == 63 && (data > 1 || byte & 0x80 != 0) {
            return Err(Error::LengthOverflow);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok((result, n));
        }
        shift += 7;
    }
}
