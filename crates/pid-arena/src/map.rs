use core::fmt;

use bytemuck::{AnyBitPattern, Zeroable};

use crate::{
    arena::Arena,
    error::{Error, Result},
    mapping::Place,
    record::Record,
    rel_ptr::{RelPtr, Width},
    sequence::SequenceRecord,
    staged::StagedOffset,
    text::TextRecord,
    view::View,
};

/// One key/value pair of an [`OrderedMapRecord`].
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Entry<K, V> {
    key: K,
    value: V,
}

// SAFETY: both fields are zeroable; padding holds no data.
unsafe impl<K: Zeroable, V: Zeroable> Zeroable for Entry<K, V> {}
// SAFETY: `repr(C)`, both fields accept any bit pattern. Padding is never
// read as part of `K` or `V`.
unsafe impl<K: AnyBitPattern, V: AnyBitPattern> AnyBitPattern for Entry<K, V> {}

impl<K: Record, V: Record> Record for Entry<K, V> {}

impl<'a, K, V> View<'a, Entry<K, V>> {
    /// The entry's key.
    #[must_use]
    pub fn key(&self) -> View<'a, K> {
        self.project(&self.into_ref().key)
    }

    /// The entry's value.
    #[must_use]
    pub fn value(&self) -> View<'a, V> {
        self.project(&self.into_ref().value)
    }
}

/// A sequence of entries sorted strictly ascending by key.
///
/// The layout is exactly that of a [`SequenceRecord`]`<Entry<K, V>>`.
/// Records are produced by a [`MapBuilder`] and looked up by binary search
/// through a [`View`]`<OrderedMapRecord<K, V>>`.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct OrderedMapRecord<K, V> {
    entries: SequenceRecord<Entry<K, V>>,
}

/// A relative pointer to an [`OrderedMapRecord`].
pub type OrderedMap<K, V> = RelPtr<OrderedMapRecord<K, V>>;

impl<K, V> fmt::Debug for OrderedMapRecord<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMapRecord")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

// SAFETY: `repr(transparent)` over a zeroable sequence header.
unsafe impl<K: Zeroable, V: Zeroable> Zeroable for OrderedMapRecord<K, V> {}
// SAFETY: `repr(transparent)` over a sequence header that accepts any bit
// pattern.
unsafe impl<K: AnyBitPattern, V: AnyBitPattern> AnyBitPattern for OrderedMapRecord<K, V> {}

impl<K: Record, V: Record> Record for OrderedMapRecord<K, V> {
    fn trailing_len(&self) -> usize {
        self.entries.trailing_len()
    }
}

/// A key type of an ordered map.
///
/// Keys are compared through their *comparable* form: scalars compare by
/// value, and pointer-shaped keys are dereferenced so that text keys compare
/// by their bytes rather than by displacement. A null pointer key has no
/// comparable form and sorts before every other key, as `None` does.
pub trait MapKey: Record {
    /// What a stored key is compared as.
    type Comparable<'a>: PartialOrd
    where
        Self: 'a;

    /// Reads the comparable form of a stored key, or `None` for a null
    /// pointer key.
    ///
    /// # Errors
    ///
    /// Any error from following a pointer-shaped key.
    fn comparable<'a>(key: View<'a, Self>) -> Result<Option<Self::Comparable<'a>>>;
}

macro_rules! impl_scalar_key {
    ($($ty:ty),* $(,)?) => {$(
        impl MapKey for $ty {
            type Comparable<'a> = Self;

            fn comparable<'a>(key: View<'a, Self>) -> Result<Option<Self>> {
                Ok(Some(*key))
            }
        }
    )*};
}

impl_scalar_key!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl<W: Width> MapKey for RelPtr<TextRecord, W> {
    type Comparable<'a> = View<'a, TextRecord>;

    fn comparable<'a>(key: View<'a, Self>) -> Result<Option<View<'a, TextRecord>>> {
        key.load()
    }
}

impl<'a, K: MapKey, V: Record> View<'a, OrderedMapRecord<K, V>> {
    /// The entries in ascending key order.
    #[must_use]
    pub fn entries(&self) -> View<'a, SequenceRecord<Entry<K, V>>> {
        self.project(&self.into_ref().entries)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Iterates over the entries in ascending key order.
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = View<'a, Entry<K, V>>> + ExactSizeIterator + use<'a, K, V>
    {
        self.entries().iter()
    }

    /// Finds the entry whose key equals `key` by binary search.
    ///
    /// # Errors
    ///
    /// Any error from reading a stored key.
    pub fn find<Q: ?Sized>(&self, key: &Q) -> Result<Option<View<'a, Entry<K, V>>>>
    where
        K::Comparable<'a>: PartialOrd<Q>,
    {
        let entries = self.entries();
        let (mut low, mut high) = (0, entries.len());
        while low < high {
            let middle = low + (high - low) / 2;
            let below = match K::comparable(entries.element(middle).key())? {
                Some(stored) => stored < *key,
                None => true,
            };
            if below {
                low = middle + 1;
            } else {
                high = middle;
            }
        }

        let Some(entry) = entries.get(low) else {
            return Ok(None);
        };
        let found = K::comparable(entry.key())?.is_some_and(|stored| stored == *key);
        Ok(found.then_some(entry))
    }

    /// The value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no entry has this key.
    /// - Any error from [`find`](Self::find).
    pub fn at<Q: ?Sized>(&self, key: &Q) -> Result<View<'a, V>>
    where
        K::Comparable<'a>: PartialOrd<Q>,
    {
        self.find(key)?
            .map(|entry| entry.value())
            .ok_or(Error::NotFound)
    }

    /// Whether an entry has this key.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> Result<bool>
    where
        K::Comparable<'a>: PartialOrd<Q>,
    {
        Ok(self.find(key)?.is_some())
    }
}

/// Fills a freshly allocated [`OrderedMapRecord`] one key at a time.
///
/// Keys must be added in strictly ascending order, and exactly as many as
/// were declared when the map was allocated with
/// [`Arena::allocate_ordered_map`].
///
/// # Examples
///
/// ```rust
/// use pid_arena::{Arena, Buffer, OrderedMapRecord};
///
/// let mut arena = Arena::new();
/// let mut builder = arena.allocate_ordered_map::<i32, u32>(2)?;
/// let low = builder.add_key(&mut arena, -1)?;
/// arena.write(low, 2)?;
/// let high = builder.add_key(&mut arena, 42)?;
/// arena.write(high, 1)?;
/// let map = builder.finish()?;
///
/// let buffer = arena.finish();
/// let map = buffer.view::<OrderedMapRecord<i32, u32>>(map.offset().unwrap_or(0))?;
/// assert_eq!(*map.at(&42)?, 1);
/// assert!(!map.contains_key(&0)?);
/// # Ok::<(), pid_arena::Error>(())
/// ```
pub struct MapBuilder<K, V> {
    entries: StagedOffset<SequenceRecord<Entry<K, V>>>,
    capacity: u32,
    len: u32,
}

impl<K: MapKey, V: AnyBitPattern> MapBuilder<K, V> {
    pub(crate) fn new(entries: StagedOffset<SequenceRecord<Entry<K, V>>>, capacity: u32) -> Self {
        Self {
            entries,
            capacity,
            len: 0,
        }
    }

    /// The map being built.
    #[must_use]
    pub fn offset(&self) -> StagedOffset<OrderedMapRecord<K, V>> {
        self.entries.cast()
    }

    /// Number of entries the map was declared with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of keys added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether no key has been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `key` in the next entry and returns that entry's value slot.
    ///
    /// # Errors
    ///
    /// - [`Error::Ownership`] if `arena` did not allocate this map.
    /// - [`Error::CapacityExceeded`] if every declared entry is filled.
    /// - [`Error::OrderingViolation`] if `key` is not strictly greater than
    ///   the previous key. The entry is left empty and may be retried.
    /// - Any error from placing or reading the key.
    pub fn add_key<P: Place<K>>(&mut self, arena: &mut Arena, key: P) -> Result<StagedOffset<V>> {
        if arena.id() != self.entries.arena() {
            return Err(Error::Ownership);
        }
        if self.len == self.capacity {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let index = self.len();
        let slot = arena.sequence_slot(self.entries, index)?;
        let stored = arena.field(slot, |entry| &entry.key)?;
        key.place(arena, stored)?;

        if let Some(previous) = index.checked_sub(1) {
            let previous = arena.field(arena.sequence_slot(self.entries, previous)?, |entry| {
                &entry.key
            })?;
            let ascending =
                K::comparable(arena.view(previous)?)? < K::comparable(arena.view(stored)?)?;
            if !ascending {
                arena.clear(stored)?;
                return Err(Error::OrderingViolation { index: self.len });
            }
        }

        self.len += 1;
        tracing::trace!(index, capacity = self.capacity, "add map key");
        arena.field(slot, |entry| &entry.value)
    }

    /// Completes the map.
    ///
    /// # Errors
    ///
    /// [`Error::Underfilled`] if fewer keys were added than declared.
    pub fn finish(self) -> Result<StagedOffset<OrderedMapRecord<K, V>>> {
        if self.len != self.capacity {
            return Err(Error::Underfilled {
                filled: self.len,
                capacity: self.capacity,
            });
        }
        tracing::debug!(len = self.len, "finish map");
        Ok(self.offset())
    }
}

impl<K, V> fmt::Debug for MapBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapBuilder")
            .field("entries", &self.entries)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Text;
    use alloc::vec::Vec;
    use rstest::*;

    fn int_map(keys: &[i32]) -> (Arena, StagedOffset<OrderedMapRecord<i32, u32>>) {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<i32, u32>(keys.len()).unwrap();
        for (i, &key) in keys.iter().enumerate() {
            let value = builder.add_key(&mut arena, key).unwrap();
            arena.write(value, u32::try_from(i).unwrap()).unwrap();
        }
        let map = builder.finish().unwrap();
        (arena, map)
    }

    #[test]
    fn entry_layout_is_key_then_value() {
        assert_eq!(size_of::<Entry<i32, i32>>(), 8);
        assert_eq!(size_of::<Entry<u8, u64>>(), 16);
        assert_eq!(size_of::<OrderedMapRecord<u8, u64>>(), 8);
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::single(&[5])]
    #[case::even(&[-7, -1, 0, 3])]
    #[case::odd(&[-100, 1, 2, 3, 1000])]
    fn every_inserted_key_is_found(#[case] keys: &[i32]) {
        let (arena, at) = int_map(keys);
        let map = arena.view(at).unwrap();

        assert_eq!(map.len(), keys.len());
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(*map.at(key).unwrap(), u32::try_from(i).unwrap());
            assert_eq!(*map.find(key).unwrap().unwrap().key(), *key);
        }
        for absent in [-1000, -2, 4, 999, 1001] {
            if !keys.contains(&absent) {
                assert_eq!(map.at(&absent).unwrap_err(), Error::NotFound);
                assert!(!map.contains_key(&absent).unwrap());
            }
        }
    }

    #[test]
    fn iteration_is_ascending() {
        let (arena, at) = int_map(&[1, 4, 9]);
        let keys: Vec<i32> = arena
            .view(at)
            .unwrap()
            .iter()
            .map(|entry| *entry.key())
            .collect();
        assert_eq!(keys, [1, 4, 9]);
    }

    #[rstest]
    #[case::equal(3, 3)]
    #[case::descending(3, 2)]
    fn out_of_order_keys_are_rejected(#[case] first: i32, #[case] second: i32) {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<i32, u32>(2).unwrap();
        builder.add_key(&mut arena, first).unwrap();

        let err = builder.add_key(&mut arena, second).unwrap_err();
        assert_eq!(err, Error::OrderingViolation { index: 1 });
        assert_eq!(builder.len(), 1);

        // The rejected slot is cleared and can take a valid key.
        builder.add_key(&mut arena, first + 1).unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn full_builder_rejects_more_keys() {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<u8, u8>(1).unwrap();
        builder.add_key(&mut arena, 1).unwrap();

        assert_eq!(
            builder.add_key(&mut arena, 2).unwrap_err(),
            Error::CapacityExceeded { capacity: 1 }
        );
    }

    #[test]
    fn underfilled_builder_does_not_finish() {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<u8, u8>(3).unwrap();
        builder.add_key(&mut arena, 1).unwrap();

        assert_eq!(
            builder.finish().unwrap_err(),
            Error::Underfilled {
                filled: 1,
                capacity: 3
            }
        );
    }

    #[test]
    fn builder_is_tied_to_its_arena() {
        let mut arena = Arena::new();
        let mut other = Arena::new();
        let mut builder = arena.allocate_ordered_map::<u8, u8>(1).unwrap();

        assert_eq!(builder.add_key(&mut other, 1), Err(Error::Ownership));
        assert!(builder.is_empty());
    }

    #[test]
    fn text_keys_compare_by_content() {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<Text, u32>(2).unwrap();
        // Allocated in reverse so displacement order disagrees with text order.
        let zebra = arena.allocate_text("zebra").unwrap();
        let apple = arena.allocate_text("apple").unwrap();

        let value = builder.add_key(&mut arena, apple).unwrap();
        arena.write(value, 1).unwrap();
        let value = builder.add_key(&mut arena, zebra).unwrap();
        arena.write(value, 2).unwrap();
        let at = builder.finish().unwrap();

        let map = arena.view(at).unwrap();
        assert_eq!(*map.at("apple").unwrap(), 1);
        assert_eq!(*map.at("zebra").unwrap(), 2);
        assert_eq!(map.at("mango").unwrap_err(), Error::NotFound);
        assert_eq!(*map.at(b"zebra".as_slice()).unwrap(), 2);
    }

    #[test]
    fn text_keys_out_of_order_are_rejected() {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<Text, u32>(2).unwrap();
        let b = arena.allocate_text("b").unwrap();
        let a = arena.allocate_text("a").unwrap();

        builder.add_key(&mut arena, b).unwrap();
        assert_eq!(
            builder.add_key(&mut arena, a).unwrap_err(),
            Error::OrderingViolation { index: 1 }
        );
    }

    #[test]
    fn null_text_key_sorts_first() {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<Text, u32>(2).unwrap();
        let null: StagedOffset<TextRecord> = arena.absent();

        let value = builder.add_key(&mut arena, null).unwrap();
        arena.write(value, 1).unwrap();
        assert_eq!(
            builder.add_key(&mut arena, null).unwrap_err(),
            Error::OrderingViolation { index: 1 }
        );
        let apple = arena.allocate_text("apple").unwrap();
        let value = builder.add_key(&mut arena, apple).unwrap();
        arena.write(value, 2).unwrap();
        let at = builder.finish().unwrap();

        let map = arena.view(at).unwrap();
        assert!(map.entries().element(0).key().is_null());
        assert_eq!(*map.at("apple").unwrap(), 2);
        assert_eq!(map.at("").unwrap_err(), Error::NotFound);
        assert_eq!(map.at("aardvark").unwrap_err(), Error::NotFound);
    }

    #[test]
    fn text_key_after_null_must_not_be_null() {
        let mut arena = Arena::new();
        let mut builder = arena.allocate_ordered_map::<Text, u32>(2).unwrap();
        let apple = arena.allocate_text("apple").unwrap();
        builder.add_key(&mut arena, apple).unwrap();

        let null: StagedOffset<TextRecord> = arena.absent();
        assert_eq!(
            builder.add_key(&mut arena, null).unwrap_err(),
            Error::OrderingViolation { index: 1 }
        );
    }
}
