use core::fmt;

use bytemuck::{AnyBitPattern, Zeroable};

use crate::{
    error::{Error, Result},
    record::Record,
    rel_ptr::RelPtr,
    view::View,
};

/// Header of a length-prefixed array of `T`.
///
/// The 32-bit length is followed by padding up to the alignment of `T` and
/// then `len` elements. Read it through a [`View`]`<SequenceRecord<T>>`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SequenceRecord<T> {
    len: u32,
    _elements: [T; 0],
}

/// A relative pointer to a [`SequenceRecord`].
pub type Sequence<T> = RelPtr<SequenceRecord<T>>;

impl<T> SequenceRecord<T> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the sequence has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> fmt::Debug for SequenceRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRecord")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

// SAFETY: `len` is zeroable and `_elements` holds no bytes.
unsafe impl<T: Zeroable> Zeroable for SequenceRecord<T> {}
// SAFETY: `repr(C)`, every field accepts any bit pattern. Padding between
// `len` and `_elements` is never read as part of `T`.
unsafe impl<T: AnyBitPattern> AnyBitPattern for SequenceRecord<T> {}

impl<T: Record> Record for SequenceRecord<T> {
    fn trailing_len(&self) -> usize {
        self.len().saturating_mul(size_of::<T>())
    }
}

impl<'a, T: Record> View<'a, SequenceRecord<T>> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.into_ref().len()
    }

    /// Whether the sequence has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.into_ref().is_empty()
    }

    /// Element `index`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `index` is past the end of the sequence.
    pub fn at(&self, index: usize) -> Result<View<'a, T>> {
        if index >= self.len() {
            return Err(Error::NotFound);
        }
        View::new(
            self.bytes(),
            self.offset() + size_of::<SequenceRecord<T>>() + index * size_of::<T>(),
        )
    }

    /// Element `index`, or `None` if it is past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<View<'a, T>> {
        self.at(index).ok()
    }

    /// Element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the sequence.
    #[must_use]
    pub fn element(&self, index: usize) -> View<'a, T> {
        match self.at(index) {
            Ok(element) => element,
            Err(err) => panic!(
                "sequence index {index} out of range for length {}: {err}",
                self.len()
            ),
        }
    }

    /// Iterates over the elements in order.
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = View<'a, T>> + ExactSizeIterator + use<'a, T> {
        let this = *self;
        (0..self.len()).map(move |index| this.element(index))
    }

    /// The elements as a slice.
    ///
    /// # Errors
    ///
    /// [`Error::Misaligned`] if the elements are zero-sized and cannot be
    /// sliced.
    pub fn as_slice(&self) -> Result<&'a [T]> {
        let start = self.offset() + size_of::<SequenceRecord<T>>();
        let bytes = &self.bytes()[start..start + self.len() * size_of::<T>()];
        bytemuck::try_cast_slice(bytes).map_err(|_| Error::Misaligned {
            offset: start,
            align: align_of::<T>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arena;
    use alloc::vec::Vec;

    #[test]
    fn header_is_padded_to_element_alignment() {
        assert_eq!(size_of::<SequenceRecord<u8>>(), 4);
        assert_eq!(size_of::<SequenceRecord<u32>>(), 4);
        assert_eq!(size_of::<SequenceRecord<u64>>(), 8);
        assert_eq!(align_of::<SequenceRecord<u8>>(), 4);
        assert_eq!(align_of::<SequenceRecord<u64>>(), 8);
    }

    #[test]
    fn elements_read_back_in_order() {
        let mut arena = Arena::new();
        let at = arena.allocate_sequence::<u64>(4).unwrap();
        arena
            .elements_mut(at)
            .unwrap()
            .copy_from_slice(&[1, 1, 2, 3]);

        let seq = arena.view(at).unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(*seq.at(3).unwrap(), 3);
        assert_eq!(seq.at(4).unwrap_err(), Error::NotFound);
        assert!(seq.get(4).is_none());
        assert_eq!(*seq.element(2), 2);

        let forward: Vec<u64> = seq.iter().map(|v| *v).collect();
        assert_eq!(forward, [1, 1, 2, 3]);
        let backward: Vec<u64> = seq.iter().rev().map(|v| *v).collect();
        assert_eq!(backward, [3, 2, 1, 1]);
    }

    #[test]
    #[should_panic(expected = "sequence index 1 out of range for length 1")]
    fn element_panics_past_the_end() {
        let mut arena = Arena::new();
        let at = arena.allocate_sequence::<u8>(1).unwrap();
        let _ = arena.view(at).unwrap().element(1);
    }

    #[test]
    fn empty_sequence() {
        let mut arena = Arena::new();
        let at = arena.allocate_sequence::<u16>(0).unwrap();
        let seq = arena.view(at).unwrap();

        assert!(seq.is_empty());
        assert_eq!(seq.iter().count(), 0);
        assert_eq!(seq.as_slice().unwrap(), &[] as &[u16]);
    }
}
