//! Subfield decoder: the single trust boundary for untrusted input.
//!
//! [`split`] decodes exactly one encoded value from the front of a byte
//! cursor, zero-copy, and reports how many bytes it spans. Every accessor
//! and iterator that touches encoded bytes routes through it exactly once
//! per subvalue. Unknown tags and truncated payloads fail outright; a
//! subvalue that cannot be decoded is never skipped, because guessing its
//! span would desynchronize the cursor for every later sibling.
//!
//! One encoded value is 1 tag byte plus a type-specific payload. Variable
//! payloads carry a [`varint`](crate::varint) length prefix, so composite
//! payloads are plain concatenations of complete subvalues with no
//! separators.

use crate::value::Kind;
use crate::{varint, Argdata, Error, Result};

/// Tag bytes of the wire format. Booleans spend two tags so their payload
/// can stay empty.
pub(crate) mod tag {
    pub const NULL: u8 = 0x00;
    pub const FALSE: u8 = 0x01;
    pub const TRUE: u8 = 0x02;
    pub const INT_POS: u8 = 0x03;
    pub const INT_NEG: u8 = 0x04;
    pub const FLOAT: u8 = 0x05;
    pub const TIMESTAMP: u8 = 0x06;
    pub const BINARY: u8 = 0x07;
    pub const STR: u8 = 0x08;
    pub const FD: u8 = 0x09;
    pub const MAP: u8 = 0x0a;
    pub const SEQ: u8 = 0x0b;
}

/// Maps a tag byte to its logical kind.
pub(crate) fn kind_of(tag_byte: u8) -> Result<Kind> {
    Ok(match tag_byte {
        tag::NULL => Kind::Null,
        tag::FALSE | tag::TRUE => Kind::Bool,
        tag::INT_POS | tag::INT_NEG => Kind::Int,
        tag::FLOAT => Kind::Float,
        tag::TIMESTAMP => Kind::Timestamp,
        tag::BINARY => Kind::Binary,
        tag::STR => Kind::Str,
        tag::FD => Kind::Fd,
        tag::MAP => Kind::Map,
        tag::SEQ => Kind::Seq,
        other => return Err(Error::UnknownTag(other)),
    })
}

/// One decoded value view: the tag byte and the payload span it declares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawValue<'d> {
    pub tag: u8,
    pub payload: &'d [u8],
}

/// Decodes exactly one value at the front of `buf`.
///
/// Returns the view and the total byte count it consumed. The remaining
/// input must cover the tag's fixed or declared payload length, otherwise
/// the whole decode fails with [`Error::Truncated`].
pub(crate) fn split(buf: &[u8]) -> Result<(RawValue<'_>, usize)> {
    let tag_byte = *buf.first().ok_or(Error::Truncated)?;
    let rest = &buf[1..];
    // The payload span excludes the length prefix; the consumed span covers
    // tag, prefix and payload. Timestamps have no outer prefix, so their
    // payload keeps the two inner length-prefixed integers whole.
    let (payload_start, payload_len) = match tag_byte {
        tag::NULL | tag::FALSE | tag::TRUE => (0, 0),
        tag::FLOAT => (0, 8),
        tag::TIMESTAMP => {
            let (sec_len, sec_hdr) = declared_len(rest)?;
            let after_sec = sec_hdr
                .checked_add(sec_len)
                .filter(|&end| end <= rest.len())
                .ok_or(Error::Truncated)?;
            let (nsec_len, nsec_hdr) = declared_len(&rest[after_sec..])?;
            let span = after_sec
                .checked_add(nsec_hdr)
                .and_then(|n| n.checked_add(nsec_len))
                .ok_or(Error::Truncated)?;
            (0, span)
        }
        tag::INT_POS | tag::INT_NEG | tag::BINARY | tag::STR | tag::FD | tag::MAP | tag::SEQ => {
            let (len, hdr) = declared_len(rest)?;
            (hdr, len)
        }
        other => return Err(Error::UnknownTag(other)),
    };
    let payload_end = payload_start
        .checked_add(payload_len)
        .ok_or(Error::Truncated)?;
    if payload_end > rest.len() {
        return Err(Error::Truncated);
    }
    let raw = RawValue {
        tag: tag_byte,
        payload: &rest[payload_start..payload_end],
    };
    Ok((raw, 1 + payload_end))
}

/// Decodes exactly one value at the front of `buf`, returned as an encoded
/// window spanning its own bytes, plus the byte count consumed.
pub fn parse(buf: &[u8]) -> Result<(Argdata<'_>, usize)> {
    let (_, consumed) = split(buf)?;
    Ok((Argdata::encoded(&buf[..consumed]), consumed))
}

/// Reads a varint length prefix and converts it to a host size.
fn declared_len(buf: &[u8]) -> Result<(usize, usize)> {
    let (len, hdr) = varint::decode(buf)?;
    let len = usize::try_from(len).map_err(|_| Error::LengthOverflow)?;
    Ok((len, hdr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_kinds_consume_one_byte() {
        for t in [tag::NULL, tag::FALSE, tag::TRUE] {
            let buf = [t, 0xaa, 0xbb];
            let (raw, consumed) = split(&buf).unwrap();
            assert_eq!(raw.tag, t);
            assert!(raw.payload.is_empty());
            assert_eq!(consumed, 1);
        }
    }

    #[test]
    fn float_consumes_nine_bytes() {
        let mut buf = vec![tag::FLOAT];
        buf.extend_from_slice(&1.5f64.to_be_bytes());
        buf.push(0xee); // trailing sibling data
        let (raw, consumed) = split(&buf).unwrap();
        assert_eq!(consumed, 9);
        assert_eq!(raw.payload, &1.5f64.to_be_bytes());
    }

    #[test]
    fn float_truncated_payload_fails() {
        let buf = [tag::FLOAT, 0, 0, 0];
        assert_eq!(split(&buf).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn length_prefixed_kinds_consume_declared_span() {
        let buf = [tag::BINARY, 3, 0x01, 0x02, 0x03, 0x99];
        let (raw, consumed) = split(&buf).unwrap();
        assert_eq!(raw.payload, &[0x01, 0x02, 0x03]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn payload_excludes_the_length_prefix() {
        // The prefix is framing, not payload: a 3-byte binary must hand its
        // 3 data bytes to the accessor, never the prefix octet.
        let buf = [tag::BINARY, 3, 1, 2, 3];
        let (raw, consumed) = split(&buf).unwrap();
        assert_eq!(raw.payload, &[1, 2, 3]);
        assert_eq!(consumed, buf.len());

        // Multi-octet prefix: 128 payload bytes need two prefix octets.
        let mut buf = vec![tag::BINARY, 0x80, 0x01];
        buf.extend_from_slice(&[0xab; 128]);
        let (raw, consumed) = split(&buf).unwrap();
        assert_eq!(raw.payload.len(), 128);
        assert_eq!(raw.payload[0], 0xab);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn declared_length_beyond_input_fails() {
        let buf = [tag::BINARY, 4, 0x01, 0x02];
        assert_eq!(split(&buf).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn huge_declared_length_does_not_wrap() {
        // Length prefix of u64::MAX must fail cleanly, never overflow into
        // a small span.
        let mut buf = vec![tag::BINARY];
        buf.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        let err = split(&buf).unwrap_err();
        assert!(
            err == Error::Truncated || err == Error::LengthOverflow,
            "{err:?}"
        );
    }

    #[test]
    fn timestamp_spans_both_integers() {
        // sec = 0x0102 (2 bytes), nsec = 0x0a (1 byte)
        let buf = [tag::TIMESTAMP, 2, 0x01, 0x02, 1, 0x0a, 0x77];
        let (raw, consumed) = split(&buf).unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(raw.payload, &[2, 0x01, 0x02, 1, 0x0a]);
    }

    #[test]
    fn timestamp_truncated_in_second_integer_fails() {
        let buf = [tag::TIMESTAMP, 1, 0x01, 2, 0x01];
        assert_eq!(split(&buf).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn empty_input_is_truncated() {
        assert_eq!(split(&[]).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn unknown_tag_fails() {
        assert_eq!(split(&[0x3f]).unwrap_err(), Error::UnknownTag(0x3f));
    }

    #[test]
    fn nested_composite_spans_whole_subtree() {
        // seq [ seq [ null ] , true ]
        let inner = [tag::SEQ, 1, tag::NULL];
        let mut buf = vec![tag::SEQ, (inner.len() + 1) as u8];
        buf.extend_from_slice(&inner);
        buf.push(tag::TRUE);
        let (raw, consumed) = split(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(raw.payload.len(), inner.len() + 1);
    }

    #[test]
    fn parse_returns_encoded_window() {
        let buf = [tag::BINARY, 1, 0xab, tag::NULL];
        let (value, consumed) = parse(&buf).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(value.get_binary().unwrap(), &[0xab]);
    }

    #[test]
    fn kind_of_covers_every_tag() {
        assert_eq!(kind_of(tag::NULL).unwrap(), Kind::Null);
        assert_eq!(kind_of(tag::FALSE).unwrap(), Kind::Bool);
        assert_eq!(kind_of(tag::TRUE).unwrap(), Kind::Bool);
        assert_eq!(kind_of(tag::INT_POS).unwrap(), Kind::Int);
        assert_eq!(kind_of(tag::INT_NEG).unwrap(), Kind::Int);
        assert_eq!(kind_of(tag::FLOAT).unwrap(), Kind::Float);
        assert_eq!(kind_of(tag::TIMESTAMP).unwrap(), Kind::Timestamp);
        assert_eq!(kind_of(tag::BINARY).unwrap(), Kind::Binary);
        assert_eq!(kind_of(tag::STR).unwrap(), Kind::Str);
        assert_eq!(kind_of(tag::FD).unwrap(), Kind::Fd);
        assert_eq!(kind_of(tag::MAP).unwrap(), Kind::Map);
        assert_eq!(kind_of(tag::SEQ).unwrap(), Kind::Seq);
        assert_eq!(kind_of(0xff).unwrap_err(), Error::UnknownTag(0xff));
    }
}
