#![no_main]
use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use pid_arena::{Buffer, Decode, View};

type Payload = BTreeMap<String, Vec<Option<i32>>>;

// Arbitrary bytes must never panic the reader: every malformed record is an
// error.
fuzz_target!(|data: &[u8]| {
    let buffer = Buffer::from_bytes(data);
    if let Ok(view) = View::root(buffer.as_bytes()) {
        let _ = Payload::decode(view);
    }
    let _ = pid_arena::from_bytes::<Vec<Vec<String>>>(buffer.as_bytes());
});
