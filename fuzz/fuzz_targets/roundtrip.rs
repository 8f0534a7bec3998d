#![no_main]
use libfuzzer_sys::fuzz_target;

use argdata::{serializer, Argdata};

// Bytes the serializer accepts as a pre-encoded value must be emitted
// verbatim: re-serialization is the identity on valid descriptor-free
// buffers.
fuzz_target!(|data: &[u8]| {
    let value = Argdata::encoded(data);
    if let Ok((buf, fds)) = serializer::serialize_to_vec(&value) {
        assert_eq!(buf, data);
        assert!(fds.is_empty());
    }
});
