//! Type-checked scalar accessors.
//!
//! Constructed values hand back their payload directly; encoded values
//! invoke the subfield decoder once and reinterpret the payload span. A
//! failed call surfaces its error and leaves the value untouched and
//! reusable for other calls.

use memchr::memchr;

use crate::subfield::{self, tag, RawValue};
use crate::value::{IntValue, Kind, Repr, Timestamp};
use crate::{magnitude, varint, Argdata, Error, Result};

impl<'d> Argdata<'d> {
    /// The logical kind of this value. For encoded values this peeks at the
    /// tag byte without decoding the payload.
    pub fn kind(&self) -> Result<Kind> {
        match &self.repr {
            Repr::Encoded(buf) => {
                let tag_byte = *buf.first().ok_or(Error::Truncated)?;
                subfield::kind_of(tag_byte)
            }
            _ => Ok(self.constructed_kind().expect("constructed value")),
        }
    }

    /// Reads a boolean.
    pub fn get_bool(&self) -> Result<bool> {
        match &self.repr {
            Repr::Bool(b) => Ok(*b),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                match raw.tag {
                    tag::FALSE => Ok(false),
                    tag::TRUE => Ok(true),
                    other => Err(mismatch(Kind::Bool, other)),
                }
            }
            _ => Err(self.constructed_mismatch(Kind::Bool)),
        }
    }

    /// Reads an integer into any primitive integer type.
    ///
    /// Fails with [`Error::OutOfRange`] when the stored value does not fit
    /// the requested width or signedness.
    pub fn get_int<T>(&self) -> Result<T>
    where
        T: TryFrom<IntValue, Error = Error>,
    {
        T::try_from(self.int_value()?)
    }

    fn int_value(&self) -> Result<IntValue> {
        match &self.repr {
            Repr::Int(v) => Ok(*v),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                match raw.tag {
                    tag::INT_POS => Ok(IntValue::Unsigned(magnitude::read_unsigned(raw.payload)?)),
                    tag::INT_NEG => {
                        let m = magnitude::read_unsigned(raw.payload)?;
                        match m {
                            0 => Err(Error::NonMinimalInt),
                            m if m <= i64::MIN.unsigned_abs() => {
                                Ok(IntValue::Signed((m as i128).wrapping_neg() as i64))
                            }
                            _ => Err(Error::OutOfRange),
                        }
                    }
                    other => Err(mismatch(Kind::Int, other)),
                }
            }
            _ => Err(self.constructed_mismatch(Kind::Int)),
        }
    }

    /// Reads a 64-bit float.
    pub fn get_float(&self) -> Result<f64> {
        match &self.repr {
            Repr::Float(f) => Ok(*f),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                if raw.tag != tag::FLOAT {
                    return Err(mismatch(Kind::Float, raw.tag));
                }
                let bits: [u8; 8] = raw.payload.try_into().map_err(|_| Error::Truncated)?;
                Ok(f64::from_be_bytes(bits))
            }
            _ => Err(self.constructed_mismatch(Kind::Float)),
        }
    }

    /// Reads a timestamp.
    pub fn get_timestamp(&self) -> Result<Timestamp> {
        match &self.repr {
            Repr::Timestamp(ts) => Ok(*ts),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                if raw.tag != tag::TIMESTAMP {
                    return Err(mismatch(Kind::Timestamp, raw.tag));
                }
                let (sec_len, sec_hdr) = varint::decode(raw.payload)?;
                let sec_end = sec_hdr + sec_len as usize;
                let sec = magnitude::read_signed(&raw.payload[sec_hdr..sec_end])?;
                let (nsec_len, nsec_hdr) = varint::decode(&raw.payload[sec_end..])?;
                let nsec_start = sec_end + nsec_hdr;
                let nsec = magnitude::read_unsigned(
                    &raw.payload[nsec_start..nsec_start + nsec_len as usize],
                )?;
                if nsec >= 1_000_000_000 {
                    return Err(Error::OutOfRange);
                }
                Ok(Timestamp {
                    sec,
                    nsec: nsec as u32,
                })
            }
            _ => Err(self.constructed_mismatch(Kind::Timestamp)),
        }
    }

    /// Reads a binary blob, borrowed from the value or its buffer.
    pub fn get_binary(&self) -> Result<&[u8]> {
        match &self.repr {
            Repr::Binary(b) => Ok(b),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                if raw.tag != tag::BINARY {
                    return Err(mismatch(Kind::Binary, raw.tag));
                }
                Ok(raw.payload)
            }
            _ => Err(self.constructed_mismatch(Kind::Binary)),
        }
    }

    /// Reads a string, borrowed from the value or its buffer.
    ///
    /// An encoded string payload must end in exactly one NUL terminator: a
    /// NUL before the declared end is an [`Error::EmbeddedNul`], a missing
    /// one is an [`Error::MissingNulTerminator`].
    pub fn get_str(&self) -> Result<&str> {
        match &self.repr {
            Repr::Str(s) => Ok(s),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                if raw.tag != tag::STR {
                    return Err(mismatch(Kind::Str, raw.tag));
                }
                let (last, content) =
                    raw.payload.split_last().ok_or(Error::MissingNulTerminator)?;
                if *last != 0 {
                    return Err(Error::MissingNulTerminator);
                }
                if memchr(0, content).is_some() {
                    return Err(Error::EmbeddedNul);
                }
                core::str::from_utf8(content).map_err(|_| Error::InvalidUtf8)
            }
            _ => Err(self.constructed_mismatch(Kind::Str)),
        }
    }

    /// Reads a file descriptor number. For a constructed value this is the
    /// real descriptor the tree was built with; for an encoded value it is
    /// the slot index into the side-channel descriptor array, to be
    /// resolved through the capability table.
    pub fn get_fd(&self) -> Result<u32> {
        match &self.repr {
            Repr::Fd(fd) => Ok(*fd),
            Repr::Encoded(buf) => {
                let raw = decode_raw(buf)?;
                if raw.tag != tag::FD {
                    return Err(mismatch(Kind::Fd, raw.tag));
                }
                let bytes: [u8; 4] = raw.payload.try_into().map_err(|_| Error::MalformedFd)?;
                Ok(u32::from_be_bytes(bytes))
            }
            _ => Err(self.constructed_mismatch(Kind::Fd)),
        }
    }

    fn constructed_mismatch(&self, expected: Kind) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.constructed_kind().expect("constructed value"),
        }
    }
}

fn decode_raw(buf: &[u8]) -> Result<RawValue<'_>> {
    let (raw, _) = subfield::split(buf)?;
    Ok(raw)
}

fn mismatch(expected: Kind, found_tag: u8) -> Error {
    match subfield::kind_of(found_tag) {
        Ok(found) => Error::TypeMismatch { expected, found },
        Err(e) => e,
    }
}
