//! Central error types for the argdata format.
//!
//! Decode errors are never silently recovered: skipping a malformed or
//! truncated subvalue would desynchronize the byte cursor for every later
//! sibling, so they are surfaced immediately and latched on iterators.
//! Accessor errors (`TypeMismatch`, `OutOfRange`) are per-call and leave the
//! value usable. Serialization errors abort the whole operation; no partial
//! buffer is ever considered valid.

use core::fmt;

use crate::value::Kind;

/// All errors produced by the argdata codec.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A tag byte does not name any value kind.
    UnknownTag(u8),
    /// The encoded input ends inside a tag, length prefix or payload.
    Truncated,
    /// A declared length does not fit in 64 bits or exceeds addressable memory.
    LengthOverflow,
    /// A map payload holds a key with no following value.
    UnpairedMapKey,
    /// An integer payload is not minimally encoded (leading zero or redundant
    /// sign octet), or a negative integer carries magnitude zero.
    NonMinimalInt,
    /// A string payload does not end in a NUL terminator.
    MissingNulTerminator,
    /// A string payload contains a NUL before its declared end.
    EmbeddedNul,
    /// A string payload is not valid UTF-8.
    InvalidUtf8,
    /// A descriptor payload is not exactly 4 bytes.
    MalformedFd,
    /// An accessor or iterator was invoked on a value of a different kind.
    TypeMismatch { expected: Kind, found: Kind },
    /// A numeric value does not fit the requested host width or signedness.
    OutOfRange,
    /// A pre-encoded value does not decode as exactly one well-formed value.
    InvalidEncodedValue,
    /// A pre-encoded value embeds descriptors, whose slot numbers cannot be
    /// renumbered against the output descriptor array.
    FdInEncodedValue,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag(tag) => write!(f, "unknown tag byte 0x{tag:02x}"),
            Self::Truncated => write!(f, "encoded input truncated inside a value"),
            Self::LengthOverflow => write!(f, "declared length exceeds addressable range"),
            Self::UnpairedMapKey => write!(f, "map payload ends after a key with no value"),
            Self::NonMinimalInt => write!(f, "integer payload is not minimally encoded"),
            Self::MissingNulTerminator => write!(f, "string payload lacks a NUL terminator"),
            Self::EmbeddedNul => write!(f, "string payload contains an embedded NUL"),
            Self::InvalidUtf8 => write!(f, "string payload is not valid UTF-8"),
            Self::MalformedFd => write!(f, "descriptor payload is not exactly 4 bytes"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected:?}, found {found:?}")
            }
            Self::OutOfRange => write!(f, "numeric value out of range for requested type"),
            Self::InvalidEncodedValue => {
                write!(f, "pre-encoded value failed to decode during serialization")
            }
            Self::FdInEncodedValue => {
                write!(f, "pre-encoded value contains descriptors and cannot be embedded")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_display() {
        let msg = Error::UnknownTag(0x7f).to_string();
        assert!(msg.contains("tag"), "{msg}");
        assert!(msg.contains("0x7f"), "{msg}");
    }

    #[test]
    fn truncated_display() {
        let msg = Error::Truncated.to_string();
        assert!(msg.contains("truncated"), "{msg}");
    }

    #[test]
    fn length_overflow_display() {
        let msg = Error::LengthOverflow.to_string();
        assert!(msg.contains("length"), "{msg}");
    }

    #[test]
    fn unpaired_map_key_display() {
        let msg = Error::UnpairedMapKey.to_string();
        assert!(msg.contains("key"), "{msg}");
    }

    #[test]
    fn non_minimal_int_display() {
        let msg = Error::NonMinimalInt.to_string();
        assert!(msg.contains("minimal"), "{msg}");
    }

    #[test]
    fn missing_nul_terminator_display() {
        let msg = Error::MissingNulTerminator.to_string();
        assert!(msg.contains("NUL"), "{msg}");
    }

    #[test]
    fn embedded_nul_display() {
        let msg = Error::EmbeddedNul.to_string();
        assert!(msg.contains("embedded"), "{msg}");
    }

    #[test]
    fn invalid_utf8_display() {
        let msg = Error::InvalidUtf8.to_string();
        assert!(msg.contains("UTF-8"), "{msg}");
    }

    #[test]
    fn malformed_fd_display() {
        let msg = Error::MalformedFd.to_string();
        assert!(msg.contains("4 bytes"), "{msg}");
    }

    #[test]
    fn type_mismatch_display() {
        let e = Error::TypeMismatch {
            expected: Kind::Str,
            found: Kind::Int,
        };
        let msg = e.to_string();
        assert!(msg.contains("Str"), "{msg}");
        assert!(msg.contains("Int"), "{msg}");
    }

    #[test]
    fn out_of_range_display() {
        let msg = Error::OutOfRange.to_string();
        assert!(msg.contains("range"), "{msg}");
    }

    #[test]
    fn invalid_encoded_value_display() {
        let msg = Error::InvalidEncodedValue.to_string();
        assert!(msg.contains("pre-encoded"), "{msg}");
    }

    #[test]
    fn fd_in_encoded_value_display() {
        let msg = Error::FdInEncodedValue.to_string();
        assert!(msg.contains("descriptor"), "{msg}");
    }

    #[test]
    fn error_implements_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Error::Truncated);
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn error_is_clone_and_eq() {
        let e1 = Error::UnpairedMapKey;
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
