use alloc::{collections::BTreeMap, string::String, vec::Vec};

use quickcheck::QuickCheck;

use crate::{Arena, Decode, Encoder};

use super::test_count;

/// Property: appending a finished arena to another one at an arbitrary
/// position leaves every record readable through the translated root.
#[test]
fn append_foreign_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: BTreeMap<u16, Vec<String>>, prefix: u8) -> bool {
        let mut foreign = Arena::new();
        let root = Encoder::new(&mut foreign).encode_root(&value).unwrap();

        let mut arena = Arena::new();
        for _ in 0..prefix {
            arena.allocate::<u8>();
        }
        let translator = arena.append_foreign(&foreign);
        let moved = translator.translate(root).unwrap();

        let decoded = BTreeMap::<u16, Vec<String>>::decode(arena.view(moved).unwrap()).unwrap();
        decoded == value && moved.offset() == root.offset().map(|o| o + translator.base())
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(BTreeMap<u16, Vec<String>>, u8) -> bool);
}
