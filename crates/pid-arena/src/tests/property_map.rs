use alloc::{collections::BTreeSet, vec::Vec};

use quickcheck::QuickCheck;

use crate::{Arena, Error};

use super::test_count;

/// Property: in a map built from unique ascending keys, every inserted key is
/// found with its value and every other key signals `NotFound`.
#[test]
fn lookup_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(keys: BTreeSet<i32>, lookups: Vec<i32>) -> bool {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<i32, i64>(keys.len()).unwrap();
        for &key in &keys {
            let value = builder.add_key(&mut arena, key).unwrap();
            arena.write(value, i64::from(key) * 3).unwrap();
        }
        let at = builder.finish().unwrap();
        let map = arena.view(at).unwrap();

        map.len() == keys.len()
            && keys
                .iter()
                .all(|key| map.at(key).map(|value| *value) == Ok(i64::from(*key) * 3))
            && lookups.iter().all(|key| {
                keys.contains(key) || map.at(key).map(|value| *value) == Err(Error::NotFound)
            })
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(BTreeSet<i32>, Vec<i32>) -> bool);
}

/// Property: inserting keys in any order other than strictly ascending fails
/// at the first key that does not exceed its predecessor.
#[test]
fn ordering_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(keys: Vec<i8>) -> bool {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<i8, u8>(keys.len()).unwrap();

        let first_violation = keys.windows(2).position(|pair| pair[0] >= pair[1]);
        for (index, &key) in keys.iter().enumerate() {
            match builder.add_key(&mut arena, key) {
                Ok(_) => {}
                Err(Error::OrderingViolation { index: failed }) => {
                    return first_violation.map(|i| i + 1) == Some(index)
                        && failed as usize == index;
                }
                Err(_) => return false,
            }
        }
        first_violation.is_none() && builder.finish().is_ok()
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(Vec<i8>) -> bool);
}
