//! Uniform traversal of maps and sequences across both representations.
//!
//! A constructed container is walked by indexing its child slices. An
//! encoded container is walked by handing the subfield decoder one subvalue
//! at a time and returning the result through a per-iterator scratch slot;
//! nothing is pre-decoded and nothing is copied out of the buffer.
//!
//! The state machine is `advancing → {advancing | exhausted | errored}`,
//! and both terminal states are sticky: once a decode error surfaces, every
//! later call repeats it, because the cursor position after a malformed
//! subvalue is meaningless. Returned references borrow the iterator
//! mutably, so a caller who wants to keep an element across an advance has
//! to copy the data out first — the scratch slot is reused.

use crate::subfield::{self, tag};
use crate::value::{Kind, Repr};
use crate::{Argdata, Error, Result};

#[derive(Debug)]
enum State {
    Advancing,
    Exhausted,
    Errored(Error),
}

/// Iterator over the entries of a sequence.
#[derive(Debug)]
pub struct SeqIterator<'d> {
    repr: SeqRepr<'d>,
    state: State,
}

#[derive(Debug)]
enum SeqRepr<'d> {
    Constructed {
        entries: &'d [Argdata<'d>],
        index: usize,
    },
    Encoded {
        payload: &'d [u8],
        offset: usize,
        scratch: Argdata<'d>,
    },
}

impl<'d> SeqIterator<'d> {
    /// Advances to the next entry.
    ///
    /// For an encoded container the returned value aliases this iterator's
    /// scratch slot and is valid only until the next call.
    #[allow(clippy::should_implement_trait)] // lending: borrows &mut self
    pub fn next(&mut self) -> Option<Result<&Argdata<'d>>> {
        match &self.state {
            State::Errored(e) => return Some(Err(e.clone())),
            State::Exhausted => return None,
            State::Advancing => {}
        }
        match &mut self.repr {
            SeqRepr::Constructed { entries, index } => {
                let Some(entry) = entries.get(*index) else {
                    self.state = State::Exhausted;
                    return None;
                };
                *index += 1;
                Some(Ok(entry))
            }
            SeqRepr::Encoded {
                payload,
                offset,
                scratch,
            } => {
                let buf: &'d [u8] = payload;
                if *offset == buf.len() {
                    self.state = State::Exhausted;
                    return None;
                }
                match subfield::parse(&buf[*offset..]) {
                    Ok((value, consumed)) => {
                        *offset += consumed;
                        *scratch = value;
                        Some(Ok(&*scratch))
                    }
                    Err(e) => {
                        self.state = State::Errored(e.clone());
                        Some(Err(e))
                    }
                }
            }
        }
    }
}

/// Iterator over the key/value pairs of a map, in original pairing order.
#[derive(Debug)]
pub struct MapIterator<'d> {
    repr: MapRepr<'d>,
    state: State,
}

#[derive(Debug)]
enum MapRepr<'d> {
    Constructed {
        keys: &'d [Argdata<'d>],
        values: &'d [Argdata<'d>],
        index: usize,
    },
    Encoded {
        payload: &'d [u8],
        offset: usize,
        key_scratch: Argdata<'d>,
        value_scratch: Argdata<'d>,
    },
}

impl<'d> MapIterator<'d> {
    /// Advances to the next key/value pair.
    ///
    /// For an encoded container the decoder runs twice, key then value; a
    /// trailing key with no value errors here, on the call that needs the
    /// missing value. Returned pairs alias the iterator's scratch slots.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Result<(&Argdata<'d>, &Argdata<'d>)>> {
        match &self.state {
            State::Errored(e) => return Some(Err(e.clone())),
            State::Exhausted => return None,
            State::Advancing => {}
        }
        match &mut self.repr {
            MapRepr::Constructed {
                keys,
                values,
                index,
            } => {
                let (Some(key), Some(value)) = (keys.get(*index), values.get(*index)) else {
                    self.state = State::Exhausted;
                    return None;
                };
                *index += 1;
                Some(Ok((key, value)))
            }
            MapRepr::Encoded {
                payload,
                offset,
                key_scratch,
                value_scratch,
            } => {
                let buf: &'d [u8] = payload;
                let start = *offset;
                if start == buf.len() {
                    self.state = State::Exhausted;
                    return None;
                }
                let step = (|| -> Result<(Argdata<'d>, Argdata<'d>, usize)> {
                    let (key, key_len) = subfield::parse(&buf[start..])?;
                    let rest = &buf[start + key_len..];
                    if rest.is_empty() {
                        return Err(Error::UnpairedMapKey);
                    }
                    let (value, value_len) = subfield::parse(rest)?;
                    Ok((key, value, key_len + value_len))
                })();
                match step {
                    Ok((key, value, consumed)) => {
                        *offset = start + consumed;
                        *key_scratch = key;
                        *value_scratch = value;
                        Some(Ok((&*key_scratch, &*value_scratch)))
                    }
                    Err(e) => {
                        self.state = State::Errored(e.clone());
                        Some(Err(e))
                    }
                }
            }
        }
    }
}

impl<'d> Argdata<'d> {
    /// Iterates a sequence, starting at its first entry.
    pub fn seq_iter(&self) -> Result<SeqIterator<'d>> {
        let repr = match self.repr {
            Repr::Seq(entries) => SeqRepr::Constructed { entries, index: 0 },
            Repr::Encoded(buf) => SeqRepr::Encoded {
                payload: composite_payload(buf, tag::SEQ, Kind::Seq)?,
                offset: 0,
                scratch: Argdata::null(),
            },
            _ => return Err(self.iter_mismatch(Kind::Seq)),
        };
        Ok(SeqIterator {
            repr,
            state: State::Advancing,
        })
    }

    /// Iterates a map, starting at its first key/value pair.
    pub fn map_iter(&self) -> Result<MapIterator<'d>> {
        let repr = match self.repr {
            Repr::Map { keys, values } => MapRepr::Constructed {
                keys,
                values,
                index: 0,
            },
            Repr::Encoded(buf) => MapRepr::Encoded {
                payload: composite_payload(buf, tag::MAP, Kind::Map)?,
                offset: 0,
                key_scratch: Argdata::null(),
                value_scratch: Argdata::null(),
            },
            _ => return Err(self.iter_mismatch(Kind::Map)),
        };
        Ok(MapIterator {
            repr,
            state: State::Advancing,
        })
    }

    fn iter_mismatch(&self, expected: Kind) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.constructed_kind().expect("constructed value"),
        }
    }
}

/// Decodes the composite header once and returns the payload span holding
/// the concatenated subvalues.
fn composite_payload<'d>(buf: &'d [u8], want_tag: u8, want: Kind) -> Result<&'d [u8]> {
    let (raw, _) = subfield::split(buf)?;
    if raw.tag != want_tag {
        return Err(Error::TypeMismatch {
            expected: want,
            found: subfield::kind_of(raw.tag)?,
        });
    }
    Ok(raw.payload)
}
