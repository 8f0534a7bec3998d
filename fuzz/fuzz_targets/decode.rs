#![no_main]
use libfuzzer_sys::fuzz_target;

use argdata::{Argdata, Error, Kind, Result};

fn walk(value: &Argdata) -> Result<()> {
    match value.kind()? {
        Kind::Null => Ok(()),
        Kind::Bool => value.get_bool().map(drop),
        Kind::Int => match value.get_int::<i64>() {
            Ok(_) => Ok(()),
            Err(Error::OutOfRange) => value.get_int::<u64>().map(drop),
            Err(e) => Err(e),
        },
        Kind::Float => value.get_float().map(drop),
        Kind::Timestamp => value.get_timestamp().map(drop),
        Kind::Binary => value.get_binary().map(drop),
        Kind::Str => value.get_str().map(drop),
        Kind::Fd => value.get_fd().map(drop),
        Kind::Seq => {
            let mut it = value.seq_iter()?;
            while let Some(entry) = it.next() {
                walk(entry?)?;
            }
            Ok(())
        }
        Kind::Map => {
            let mut it = value.map_iter()?;
            while let Some(pair) = it.next() {
                let (key, entry) = pair?;
                walk(key)?;
                walk(entry)?;
            }
            Ok(())
        }
    }
}

// Arbitrary bytes must never panic the decoder, only error.
fuzz_target!(|data: &[u8]| {
    let _ = walk(&Argdata::encoded(data));
});
