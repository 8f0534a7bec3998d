//! argdata – self-describing binary argument data for capability-based
//! process configuration.
//!
//! A process running under capability-based security holds exactly the
//! authority its file descriptors grant. This crate builds and transmits
//! that initial state: an immutable value tree describing configuration
//! plus descriptor capabilities, serialized into a byte buffer and a
//! deduplicated, renumbered descriptor array. Descriptor values never put
//! a real descriptor number on the wire — only a slot index into the
//! side-channel array, so the bytes alone grant nothing.
//!
//! Values come in two representations with one API: constructed trees over
//! caller-owned child arrays, and zero-copy windows into an untrusted
//! encoded buffer that are decoded lazily, one subvalue per iterator
//! advance.
//!
//! # Example
//!
//! ```
//! use argdata::{serializer, Argdata};
//!
//! // Sending side: build a tree and flatten it.
//! let keys = [Argdata::str("console"), Argdata::str("verbose")];
//! let values = [Argdata::fd(2), Argdata::boolean(true)];
//! let tree = Argdata::map(&keys, &values);
//! let (buf, fds) = serializer::serialize_to_vec(&tree).unwrap();
//! assert_eq!(fds, vec![2]);
//!
//! // Receiving side: interpret the buffer lazily.
//! let root = Argdata::encoded(&buf);
//! let mut it = root.map_iter().unwrap();
//! let (key, value) = it.next().unwrap().unwrap();
//! assert_eq!(key.get_str().unwrap(), "console");
//! assert_eq!(value.get_fd().unwrap(), 0); // slot, not descriptor 2
//! ```

pub mod access;
pub mod error;
pub mod fd_table;
pub mod iterator;
mod magnitude;
pub mod serializer;
pub mod subfield;
pub mod value;
mod varint;

pub use error::{Error, Result};

/// HashMap with ahash (fast, not DoS-resistant — internal data structures).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap with ahash (deterministic insertion-order iteration + fast hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: values
pub use value::{Argdata, IntValue, Kind, Timestamp};

// Public API: iterators
pub use iterator::{MapIterator, SeqIterator};

// Public API: serialization
pub use serializer::{measure, serialize, serialize_to_vec, Measurement};

// Public API: capability table boundary
pub use fd_table::{CapabilityTable, FdTable};
