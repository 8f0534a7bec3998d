//! Value model and constructors.
//!
//! An [`Argdata`] is immutable and comes in two physical representations: a
//! constructed tree node holding its typed payload directly, or an encoded
//! window into an externally owned byte buffer that is decoded lazily, one
//! subvalue at a time. Accessors and iterators switch on this discriminant;
//! nothing else in the crate needs to know which side a value came from.
//!
//! Composite constructors borrow caller-supplied slices and never copy or
//! take ownership of children. The `'d` lifetime is the whole ownership
//! story: a parent is usable exactly as long as the arrays (and buffers) it
//! was built over.

use std::borrow::Cow;

/// The logical kind of a value, independent of its representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Timestamp,
    Binary,
    Str,
    Fd,
    Map,
    Seq,
}

/// One logical integer kind fed by every host signed and unsigned width.
///
/// The minimal wire width is chosen at serialization time, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntValue {
    Signed(i64),
    Unsigned(u64),
}

macro_rules! int_value_from {
    (signed: $($t:ty),*) => {$(
        impl From<$t> for IntValue {
            fn from(value: $t) -> Self {
                IntValue::Signed(value as i64)
            }
        }
    )*};
    (unsigned: $($t:ty),*) => {$(
        impl From<$t> for IntValue {
            fn from(value: $t) -> Self {
                IntValue::Unsigned(value as u64)
            }
        }
    )*};
}

int_value_from!(signed: i8, i16, i32, i64);
int_value_from!(unsigned: u8, u16, u32, u64);

macro_rules! int_value_try_into {
    ($($t:ty),*) => {$(
        impl TryFrom<IntValue> for $t {
            type Error = crate::Error;

            fn try_from(value: IntValue) -> crate::Result<$t> {
                match value {
                    IntValue::Signed(s) => <$t>::try_from(s).map_err(|_| crate::Error::OutOfRange),
                    IntValue::Unsigned(u) => <$t>::try_from(u).map_err(|_| crate::Error::OutOfRange),
                }
            }
        }
    )*};
}

int_value_try_into!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// A point in time: seconds since the epoch plus nanoseconds within the
/// second. Seconds may be negative; nanoseconds stay below one billion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: u32,
}

/// An immutable argdata value.
#[derive(Debug, Clone)]
pub struct Argdata<'d> {
    pub(crate) repr: Repr<'d>,
}

#[derive(Debug, Clone)]
pub(crate) enum Repr<'d> {
    Null,
    Bool(bool),
    Int(IntValue),
    Float(f64),
    Timestamp(Timestamp),
    Binary(&'d [u8]),
    Str(Cow<'d, str>),
    Fd(u32),
    Map {
        keys: &'d [Argdata<'d>],
        values: &'d [Argdata<'d>],
    },
    Seq(&'d [Argdata<'d>]),
    /// An already-encoded value: a tagged window into external bytes.
    /// Serves both as the lazy buffer-backed representation and as the
    /// embeddable pre-encoded kind.
    Encoded(&'d [u8]),
}

impl<'d> Argdata<'d> {
    /// The null value.
    pub fn null() -> Argdata<'static> {
        Argdata { repr: Repr::Null }
    }

    /// A boolean value.
    pub fn boolean(value: bool) -> Argdata<'static> {
        Argdata {
            repr: Repr::Bool(value),
        }
    }

    /// An integer value, from any primitive signed or unsigned integer.
    pub fn int(value: impl Into<IntValue>) -> Argdata<'static> {
        Argdata {
            repr: Repr::Int(value.into()),
        }
    }

    /// A 64-bit floating point value.
    pub fn float(value: f64) -> Argdata<'static> {
        Argdata {
            repr: Repr::Float(value),
        }
    }

    /// A timestamp value.
    ///
    /// # Panics
    ///
    /// Panics if `nsec` is not below one billion.
    pub fn timestamp(sec: i64, nsec: u32) -> Argdata<'static> {
        assert!(nsec < 1_000_000_000, "nanoseconds {nsec} out of range");
        Argdata {
            repr: Repr::Timestamp(Timestamp { sec, nsec }),
        }
    }

    /// A binary blob, borrowed from the caller.
    pub fn binary(value: &'d [u8]) -> Argdata<'d> {
        Argdata {
            repr: Repr::Binary(value),
        }
    }

    /// A string value: borrowed from a `&str`, owned from a `String`.
    ///
    /// The wire form is NUL-terminated, so a string containing an interior
    /// NUL byte is constructible and readable but fails serialization with
    /// [`Error::EmbeddedNul`](crate::Error::EmbeddedNul).
    pub fn str(value: impl Into<Cow<'d, str>>) -> Argdata<'d> {
        Argdata {
            repr: Repr::Str(value.into()),
        }
    }

    /// A file descriptor value. On the sending side this is a real
    /// descriptor number; the serializer replaces it with a slot index, so
    /// the number itself never reaches the byte stream.
    pub fn fd(fd: u32) -> Argdata<'static> {
        Argdata { repr: Repr::Fd(fd) }
    }

    /// A map over caller-owned parallel key and value slices. Duplicate
    /// keys are permitted and pairing order is preserved; there is no
    /// deduplication or sorting.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn map(keys: &'d [Argdata<'d>], values: &'d [Argdata<'d>]) -> Argdata<'d> {
        assert_eq!(
            keys.len(),
            values.len(),
            "map keys and values differ in length"
        );
        Argdata {
            repr: Repr::Map { keys, values },
        }
    }

    /// A sequence over a caller-owned slice of entries.
    pub fn seq(entries: &'d [Argdata<'d>]) -> Argdata<'d> {
        Argdata {
            repr: Repr::Seq(entries),
        }
    }

    /// Wraps externally owned encoded bytes without validating them.
    ///
    /// This is both the entry point for interpreting an untrusted received
    /// buffer and the way to embed a pre-encoded sub-stream into a larger
    /// tree. Validation happens lazily in accessors and iterators, or
    /// eagerly when the serializer embeds the bytes.
    pub fn encoded(bytes: &'d [u8]) -> Argdata<'d> {
        Argdata {
            repr: Repr::Encoded(bytes),
        }
    }

    /// The kind a constructed value was built as, without decoding.
    pub(crate) fn constructed_kind(&self) -> Option<Kind> {
        match self.repr {
            Repr::Null => Some(Kind::Null),
            Repr::Bool(_) => Some(Kind::Bool),
            Repr::Int(_) => Some(Kind::Int),
            Repr::Float(_) => Some(Kind::Float),
            Repr::Timestamp(_) => Some(Kind::Timestamp),
            Repr::Binary(_) => Some(Kind::Binary),
            Repr::Str(_) => Some(Kind::Str),
            Repr::Fd(_) => Some(Kind::Fd),
            Repr::Map { .. } => Some(Kind::Map),
            Repr::Seq(_) => Some(Kind::Seq),
            Repr::Encoded(_) => None,
        }
    }
}
