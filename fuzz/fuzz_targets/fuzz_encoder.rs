#![no_main]
use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pid_arena::{Arena, Buffer, Decode, Encoder, EncoderOptions};

type Payload = BTreeMap<String, Vec<Option<i32>>>;

#[derive(Arbitrary, Debug)]
struct Input {
    deduplicate_text: bool,
    deduplicate_sequences: bool,
    /// Bytes of an unrelated arena built first, so the payload does not
    /// start at offset zero.
    prefix: Vec<u8>,
    payload: Payload,
}

fuzz_target!(|input: Input| {
    let options = EncoderOptions {
        deduplicate_text: input.deduplicate_text,
        deduplicate_sequences: input.deduplicate_sequences,
    };

    let mut arena = Arena::new();
    arena.allocate_text(&input.prefix).expect("prefix fits");
    let root = Encoder::with_options(&mut arena, options)
        .encode_root(&input.payload)
        .expect("payload encodes");
    let root = root.offset().expect("root is present");

    // Read back from a copy at a different address.
    let buffer = Buffer::from_bytes(arena.finish().as_bytes());
    let view = buffer.view(root).expect("root is readable");
    let decoded = Payload::decode(view).expect("payload decodes");
    assert_eq!(decoded, input.payload);

    for (key, values) in &input.payload {
        let map = view.target().expect("map is present");
        let stored = map.at(key.as_str()).expect("key is present");
        assert_eq!(stored.target().expect("values are present").len(), values.len());
    }
});
