//! Two-pass serialization: measure, then emit.
//!
//! Both passes drive the same traversal routine, [`write_value`], over a
//! [`Sink`] that either counts bytes or writes them. Descriptor slots are
//! assigned by first-encounter order during traversal, held in an
//! insertion-ordered map, so the assignment is a pure function of traversal
//! order and cannot drift between the passes. A descriptor referenced
//! several times occupies exactly one slot.
//!
//! The emitted byte stream never contains a real descriptor number, only
//! slot indices into the side-channel descriptor array; the array ordering
//! produced here is the renumbering the process-creation step must honor.
//!
//! Pre-encoded values are validated before being copied verbatim: the bytes
//! must decode as exactly one well-formed value, recursively, and must not
//! contain descriptors — an embedded slot number would alias whatever
//! happens to occupy that slot in the new table. Any failure aborts the
//! whole serialization; there is no partial output.

use memchr::memchr;

use crate::subfield::{self, tag};
use crate::value::{IntValue, Repr};
use crate::{magnitude, varint, Argdata, Error, FastIndexMap, Result};

/// Output of the measure pass: exact buffer and descriptor array sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Total encoded byte length.
    pub buffer_len: usize,
    /// Count of distinct descriptor values referenced anywhere in the tree.
    pub fd_count: usize,
}

/// Computes the exact serialized size of `value` and the number of distinct
/// descriptors it references.
pub fn measure(value: &Argdata) -> Result<Measurement> {
    let mut sink = MeasureSink {
        len: 0,
        slots: SlotAssignment::default(),
    };
    write_value(value, &mut sink)?;
    Ok(Measurement {
        buffer_len: sink.len,
        fd_count: sink.slots.len(),
    })
}

/// Serializes `value` into caller-supplied storage.
///
/// `buf` and `fds` must be sized exactly as returned by [`measure`] on the
/// same tree; each distinct descriptor's real value is written once at its
/// assigned slot.
///
/// # Panics
///
/// Panics if `buf` or `fds` do not match the measured sizes.
pub fn serialize(value: &Argdata, buf: &mut [u8], fds: &mut [u32]) -> Result<()> {
    let mut sink = EmitSink {
        buf,
        pos: 0,
        fds,
        slots: SlotAssignment::default(),
    };
    write_value(value, &mut sink)?;
    assert_eq!(sink.pos, sink.buf.len(), "output buffer not sized by measure");
    assert_eq!(
        sink.slots.len(),
        sink.fds.len(),
        "descriptor array not sized by measure"
    );
    Ok(())
}

/// Measures and serializes in one call, allocating the outputs.
pub fn serialize_to_vec(value: &Argdata) -> Result<(Vec<u8>, Vec<u32>)> {
    let measurement = measure(value)?;
    let mut buf = vec![0u8; measurement.buffer_len];
    let mut fds = vec![0u32; measurement.fd_count];
    serialize(value, &mut buf, &mut fds)?;
    Ok((buf, fds))
}

/// First-encounter-order descriptor slot assignment, shared in shape by
/// both passes. The map iterates in insertion order, so slot numbers depend
/// only on the order descriptors are visited.
#[derive(Default)]
struct SlotAssignment {
    slots: FastIndexMap<u32, u32>,
}

impl SlotAssignment {
    /// Returns the slot for `fd`, assigning the next one on first sight.
    fn slot(&mut self, fd: u32) -> (u32, bool) {
        let next = self.slots.len() as u32;
        match self.slots.entry(fd) {
            indexmap::map::Entry::Occupied(e) => (*e.get(), false),
            indexmap::map::Entry::Vacant(e) => {
                e.insert(next);
                (next, true)
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Byte and descriptor output of one pass.
trait Sink {
    fn put(&mut self, bytes: &[u8]);
    fn fd(&mut self, fd: u32) -> u32;
}

struct MeasureSink {
    len: usize,
    slots: SlotAssignment,
}

impl Sink for MeasureSink {
    fn put(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }

    fn fd(&mut self, fd: u32) -> u32 {
        self.slots.slot(fd).0
    }
}

struct EmitSink<'b> {
    buf: &'b mut [u8],
    pos: usize,
    fds: &'b mut [u32],
    slots: SlotAssignment,
}

impl Sink for EmitSink<'_> {
    fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        assert!(end <= self.buf.len(), "output buffer not sized by measure");
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    fn fd(&mut self, fd: u32) -> u32 {
        let (slot, fresh) = self.slots.slot(fd);
        if fresh {
            self.fds[slot as usize] = fd;
        }
        slot
    }
}

/// The single traversal routine both passes share: depth first, map keys
/// before values, entries in original order.
fn write_value(value: &Argdata, sink: &mut impl Sink) -> Result<()> {
    match &value.repr {
        Repr::Null => sink.put(&[tag::NULL]),
        Repr::Bool(false) => sink.put(&[tag::FALSE]),
        Repr::Bool(true) => sink.put(&[tag::TRUE]),
        Repr::Int(v) => {
            let (tag_byte, m) = int_wire(*v);
            let (be, n) = magnitude::unsigned_bytes(m);
            sink.put(&[tag_byte]);
            put_varint(sink, n as u64);
            sink.put(&be[8 - n..]);
        }
        Repr::Float(f) => {
            sink.put(&[tag::FLOAT]);
            sink.put(&f.to_be_bytes());
        }
        Repr::Timestamp(ts) => {
            sink.put(&[tag::TIMESTAMP]);
            let (sec_be, sec_n) = magnitude::signed_bytes(ts.sec);
            put_varint(sink, sec_n as u64);
            sink.put(&sec_be[8 - sec_n..]);
            let (nsec_be, nsec_n) = magnitude::unsigned_bytes(u64::from(ts.nsec));
            put_varint(sink, nsec_n as u64);
            sink.put(&nsec_be[8 - nsec_n..]);
        }
        Repr::Binary(b) => {
            sink.put(&[tag::BINARY]);
            put_varint(sink, b.len() as u64);
            sink.put(b);
        }
        Repr::Str(s) => {
            // The wire form is NUL-terminated, so a string with an interior
            // NUL has no encoding that decodes back to itself.
            if memchr(0, s.as_bytes()).is_some() {
                return Err(Error::EmbeddedNul);
            }
            sink.put(&[tag::STR]);
            put_varint(sink, s.len() as u64 + 1);
            sink.put(s.as_bytes());
            sink.put(&[0]);
        }
        Repr::Fd(fd) => {
            let slot = sink.fd(*fd);
            sink.put(&[tag::FD]);
            put_varint(sink, 4);
            sink.put(&slot.to_be_bytes());
        }
        Repr::Map { keys, values } => {
            let mut payload = 0;
            for (key, value) in keys.iter().zip(values.iter()) {
                payload += encoded_length(key) + encoded_length(value);
            }
            sink.put(&[tag::MAP]);
            put_varint(sink, payload as u64);
            for (key, value) in keys.iter().zip(values.iter()) {
                write_value(key, sink)?;
                write_value(value, sink)?;
            }
        }
        Repr::Seq(entries) => {
            let payload: usize = entries.iter().map(encoded_length).sum();
            sink.put(&[tag::SEQ]);
            put_varint(sink, payload as u64);
            for entry in entries.iter() {
                write_value(entry, sink)?;
            }
        }
        Repr::Encoded(bytes) => {
            validate_encoded(bytes)?;
            sink.put(bytes);
        }
    }
    Ok(())
}

fn put_varint(sink: &mut impl Sink, value: u64) {
    let (bytes, n) = varint::encode(value);
    sink.put(&bytes[..n]);
}

fn int_wire(value: IntValue) -> (u8, u64) {
    match value {
        IntValue::Signed(s) if s < 0 => (tag::INT_NEG, s.unsigned_abs()),
        IntValue::Signed(s) => (tag::INT_POS, s as u64),
        IntValue::Unsigned(u) => (tag::INT_POS, u),
    }
}

/// Exact encoded byte length of one value. Depends only on the tree, never
/// on descriptor slot assignment: descriptor payloads are fixed width
/// precisely so length stays independent of dedup state.
fn encoded_length(value: &Argdata) -> usize {
    match &value.repr {
        Repr::Null | Repr::Bool(_) => 1,
        Repr::Int(v) => {
            let (_, m) = int_wire(*v);
            let (_, n) = magnitude::unsigned_bytes(m);
            1 + varint::encoded_len(n as u64) + n
        }
        Repr::Float(_) => 9,
        Repr::Timestamp(ts) => {
            let (_, sec_n) = magnitude::signed_bytes(ts.sec);
            let (_, nsec_n) = magnitude::unsigned_bytes(u64::from(ts.nsec));
            1 + varint::encoded_len(sec_n as u64)
                + sec_n
                + varint::encoded_len(nsec_n as u64)
                + nsec_n
        }
        Repr::Binary(b) => 1 + varint::encoded_len(b.len() as u64) + b.len(),
        Repr::Str(s) => {
            let payload = s.len() + 1;
            1 + varint::encoded_len(payload as u64) + payload
        }
        Repr::Fd(_) => 1 + varint::encoded_len(4) + 4,
        Repr::Map { keys, values } => {
            let payload: usize = keys
                .iter()
                .zip(values.iter())
                .map(|(k, v)| encoded_length(k) + encoded_length(v))
                .sum();
            1 + varint::encoded_len(payload as u64) + payload
        }
        Repr::Seq(entries) => {
            let payload: usize = entries.iter().map(encoded_length).sum();
            1 + varint::encoded_len(payload as u64) + payload
        }
        Repr::Encoded(bytes) => bytes.len(),
    }
}

/// Deep-validates pre-encoded bytes: exactly one well-formed value with no
/// trailing data, no descriptors anywhere. The walk keeps its pending
/// composites on a heap worklist, so input nesting depth never maps to
/// stack depth.
fn validate_encoded(bytes: &[u8]) -> Result<()> {
    let (root, consumed) = subfield::split(bytes).map_err(invalid)?;
    if consumed != bytes.len() {
        return Err(Error::InvalidEncodedValue);
    }
    let mut pending = vec![root];
    while let Some(raw) = pending.pop() {
        match raw.tag {
            tag::FD => return Err(Error::FdInEncodedValue),
            tag::MAP | tag::SEQ => {
                let mut payload = raw.payload;
                let mut count = 0usize;
                while !payload.is_empty() {
                    let (child, consumed) = subfield::split(payload).map_err(invalid)?;
                    pending.push(child);
                    payload = &payload[consumed..];
                    count += 1;
                }
                if raw.tag == tag::MAP && count % 2 != 0 {
                    return Err(Error::InvalidEncodedValue);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn invalid(e: Error) -> Error {
    match e {
        // A descriptor found deeper in the walk keeps its specific error.
        Error::FdInEncodedValue => e,
        _ => Error::InvalidEncodedValue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    #[test]
    fn measure_matches_emitted_length() {
        let keys = [Argdata::str("name"), Argdata::str("flags")];
        let inner = [Argdata::int(1u8), Argdata::int(-300i64)];
        let values = [Argdata::str(String::from("demo")), Argdata::seq(&inner)];
        let tree = Argdata::map(&keys, &values);

        let m = measure(&tree).unwrap();
        let (buf, fds) = serialize_to_vec(&tree).unwrap();
        assert_eq!(buf.len(), m.buffer_len);
        assert_eq!(fds.len(), m.fd_count);
        assert_eq!(m.fd_count, 0);
    }

    #[test]
    fn repeated_descriptor_occupies_one_slot() {
        let entries = [Argdata::fd(5), Argdata::fd(5), Argdata::fd(5)];
        let tree = Argdata::seq(&entries);
        let (buf, fds) = serialize_to_vec(&tree).unwrap();
        assert_eq!(fds, vec![5]);

        // All three occurrences decode back to slot 0.
        let decoded = Argdata::encoded(&buf);
        let mut it = decoded.seq_iter().unwrap();
        for _ in 0..3 {
            assert_eq!(it.next().unwrap().unwrap().get_fd().unwrap(), 0);
        }
        assert!(it.next().is_none());
    }

    #[test]
    fn slot_order_is_first_encounter_order() {
        // Descriptors A, B, A, C must produce the array [A, B, C].
        let entries = [
            Argdata::fd(30),
            Argdata::fd(10),
            Argdata::fd(30),
            Argdata::fd(20),
        ];
        let tree = Argdata::seq(&entries);
        let (buf, fds) = serialize_to_vec(&tree).unwrap();
        assert_eq!(fds, vec![30, 10, 20]);

        let decoded = Argdata::encoded(&buf);
        let mut it = decoded.seq_iter().unwrap();
        let mut slots = Vec::new();
        while let Some(entry) = it.next() {
            slots.push(entry.unwrap().get_fd().unwrap());
        }
        assert_eq!(slots, vec![0, 1, 0, 2]);
    }

    #[test]
    fn descriptors_in_nested_maps_are_counted() {
        let keys = [Argdata::str("in"), Argdata::str("out")];
        let values = [Argdata::fd(0), Argdata::fd(1)];
        let map = Argdata::map(&keys, &values);
        let entries = [map.clone(), Argdata::fd(0)];
        let tree = Argdata::seq(&entries);

        let m = measure(&tree).unwrap();
        assert_eq!(m.fd_count, 2);
        let (_, fds) = serialize_to_vec(&tree).unwrap();
        assert_eq!(fds, vec![0, 1]);
    }

    #[test]
    fn string_with_interior_nul_fails_serialization() {
        // No byte stream can hold this string and decode back to it, so the
        // serializer refuses instead of emitting a buffer whose own get_str
        // would fail.
        let tree = Argdata::str("a\0b");
        assert_eq!(measure(&tree).unwrap_err(), Error::EmbeddedNul);
        assert_eq!(serialize_to_vec(&tree).unwrap_err(), Error::EmbeddedNul);

        let entries = [Argdata::null(), Argdata::str(String::from("x\0"))];
        let tree = Argdata::seq(&entries);
        assert_eq!(serialize_to_vec(&tree).unwrap_err(), Error::EmbeddedNul);
    }

    #[test]
    fn valid_pre_encoded_value_is_embedded_verbatim() {
        let (inner_buf, _) = serialize_to_vec(&Argdata::str("nested")).unwrap();
        let entries = [Argdata::encoded(&inner_buf), Argdata::int(1u8)];
        let tree = Argdata::seq(&entries);
        let (buf, _) = serialize_to_vec(&tree).unwrap();

        let decoded = Argdata::encoded(&buf);
        let mut it = decoded.seq_iter().unwrap();
        assert_eq!(it.next().unwrap().unwrap().get_str().unwrap(), "nested");
        assert_eq!(it.next().unwrap().unwrap().get_int::<u8>().unwrap(), 1);
    }

    #[test]
    fn malformed_pre_encoded_value_aborts_serialization() {
        let bad = [0x7c, 0x01];
        let entries = [Argdata::encoded(&bad)];
        let tree = Argdata::seq(&entries);
        assert_eq!(measure(&tree).unwrap_err(), Error::InvalidEncodedValue);
        assert_eq!(
            serialize_to_vec(&tree).unwrap_err(),
            Error::InvalidEncodedValue
        );
    }

    #[test]
    fn pre_encoded_value_with_trailing_bytes_rejected() {
        let mut bytes = Vec::new();
        let (buf, _) = serialize_to_vec(&Argdata::null()).unwrap();
        bytes.extend_from_slice(&buf);
        bytes.push(0xaa);
        let tree = Argdata::encoded(&bytes);
        assert_eq!(measure(&tree).unwrap_err(), Error::InvalidEncodedValue);
    }

    #[test]
    fn pre_encoded_descriptor_rejected() {
        // fd slot 0, hand-encoded; its slot numbering belongs to some other
        // serialization and cannot be embedded.
        let bytes = [tag::FD, 4, 0, 0, 0, 0];
        let tree = Argdata::encoded(&bytes);
        assert_eq!(measure(&tree).unwrap_err(), Error::FdInEncodedValue);

        // Also when buried inside a pre-encoded sequence.
        let nested = [tag::SEQ, 6, tag::FD, 4, 0, 0, 0, 0];
        let tree = Argdata::encoded(&nested);
        assert_eq!(measure(&tree).unwrap_err(), Error::FdInEncodedValue);
    }

    #[test]
    fn deeply_nested_pre_encoded_value_validates_without_overflow() {
        // Well-formed nesting far beyond any sane tree; validation must
        // complete (and succeed), not exhaust the call stack.
        let mut bytes = vec![tag::NULL];
        for _ in 0..10_000 {
            let (prefix, n) = varint::encode(bytes.len() as u64);
            let mut outer = Vec::with_capacity(1 + n + bytes.len());
            outer.push(tag::SEQ);
            outer.extend_from_slice(&prefix[..n]);
            outer.extend_from_slice(&bytes);
            bytes = outer;
        }
        let tree = Argdata::encoded(&bytes);
        let m = measure(&tree).unwrap();
        assert_eq!(m.buffer_len, bytes.len());

        // A descriptor buried at the bottom is still found.
        let mut bytes = vec![tag::FD, 4, 0, 0, 0, 0];
        for _ in 0..10_000 {
            let (prefix, n) = varint::encode(bytes.len() as u64);
            let mut outer = Vec::with_capacity(1 + n + bytes.len());
            outer.push(tag::SEQ);
            outer.extend_from_slice(&prefix[..n]);
            outer.extend_from_slice(&bytes);
            bytes = outer;
        }
        let tree = Argdata::encoded(&bytes);
        assert_eq!(measure(&tree).unwrap_err(), Error::FdInEncodedValue);
    }

    #[test]
    fn pre_encoded_map_with_odd_entry_count_rejected() {
        let bytes = [tag::MAP, 1, tag::NULL];
        let tree = Argdata::encoded(&bytes);
        assert_eq!(measure(&tree).unwrap_err(), Error::InvalidEncodedValue);
    }

    #[test]
    #[should_panic(expected = "not sized by measure")]
    fn undersized_buffer_panics() {
        let tree = Argdata::str("hello");
        let mut buf = vec![0u8; 2];
        let mut fds: [u32; 0] = [];
        let _ = serialize(&tree, &mut buf, &mut fds);
    }

    #[test]
    fn scalar_wire_bytes_are_stable() {
        let (buf, _) = serialize_to_vec(&Argdata::null()).unwrap();
        assert_eq!(buf, vec![tag::NULL]);

        let (buf, _) = serialize_to_vec(&Argdata::boolean(true)).unwrap();
        assert_eq!(buf, vec![tag::TRUE]);

        let (buf, _) = serialize_to_vec(&Argdata::int(0u8)).unwrap();
        assert_eq!(buf, vec![tag::INT_POS, 0]);

        let (buf, _) = serialize_to_vec(&Argdata::int(-2i8)).unwrap();
        assert_eq!(buf, vec![tag::INT_NEG, 1, 0x02]);

        let (buf, _) = serialize_to_vec(&Argdata::str("hi")).unwrap();
        assert_eq!(buf, vec![tag::STR, 3, b'h', b'i', 0]);

        let (buf, fds) = serialize_to_vec(&Argdata::fd(9)).unwrap();
        assert_eq!(buf, vec![tag::FD, 4, 0, 0, 0, 0]);
        assert_eq!(fds, vec![9]);
    }

    #[test]
    fn round_trip_preserves_structure_and_kinds() {
        let seq_entries = [Argdata::float(2.5), Argdata::timestamp(1_600_000_000, 42)];
        let keys = [Argdata::str("k1"), Argdata::str("k1")];
        let values = [Argdata::seq(&seq_entries), Argdata::binary(b"raw")];
        let tree = Argdata::map(&keys, &values);

        let (buf, _) = serialize_to_vec(&tree).unwrap();
        let decoded = Argdata::encoded(&buf);
        assert_eq!(decoded.kind().unwrap(), Kind::Map);

        let mut it = decoded.map_iter().unwrap();
        {
            let (k, v) = it.next().unwrap().unwrap();
            assert_eq!(k.get_str().unwrap(), "k1");
            let mut inner = v.seq_iter().unwrap();
            assert_eq!(inner.next().unwrap().unwrap().get_float().unwrap(), 2.5);
            let ts = inner.next().unwrap().unwrap().get_timestamp().unwrap();
            assert_eq!((ts.sec, ts.nsec), (1_600_000_000, 42));
        }
        {
            let (k, v) = it.next().unwrap().unwrap();
            assert_eq!(k.get_str().unwrap(), "k1");
            assert_eq!(v.get_binary().unwrap(), b"raw");
        }
        assert!(it.next().is_none());
    }
}
