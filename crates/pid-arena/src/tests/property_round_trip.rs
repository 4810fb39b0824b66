use alloc::{collections::BTreeMap, string::String, vec::Vec};

use quickcheck::QuickCheck;

use crate::{Buffer, Decode, Encode, from_bytes, to_buffer};

use super::test_count;

fn round_trips<T>(value: &T) -> bool
where
    T: Encode + Decode + PartialEq,
{
    let buffer = to_buffer(value).unwrap();
    from_bytes::<T>(buffer.as_bytes()).unwrap() == *value
}

/// Property: every supported shape decodes to the value it was encoded from.
#[test]
fn round_trip_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(
        texts: Vec<Option<String>>,
        nested: BTreeMap<String, Vec<i16>>,
        scalars: BTreeMap<i64, Option<u8>>,
    ) -> bool {
        round_trips(&texts) && round_trips(&nested) && round_trips(&scalars)
    }

    QuickCheck::new().tests(test_count()).quickcheck(
        prop as fn(Vec<Option<String>>, BTreeMap<String, Vec<i16>>, BTreeMap<i64, Option<u8>>) -> bool,
    );
}

/// Property: a buffer read back through `Buffer::from_bytes` is byte-for-byte
/// the buffer that was written.
#[test]
fn copy_preserves_bytes_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: Vec<Vec<String>>) -> bool {
        let buffer = to_buffer(&value).unwrap();
        let copy = Buffer::from_bytes(buffer.as_bytes());
        copy == buffer && from_bytes::<Vec<Vec<String>>>(copy.as_bytes()).unwrap() == value
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(Vec<Vec<String>>) -> bool);
}
