use core::{fmt, marker::PhantomData};

use crate::{
    arena::{Arena, ArenaId},
    error::{Error, Result},
    rel_ptr::{RelPtr, Width},
};

/// A handle to a `T` that lives in an [`Arena`].
///
/// A staged offset stores the identity of the arena that produced it and an
/// integer offset into that arena's bytes, never an address. It stays valid
/// while the arena grows and reallocates, and every access resolves it
/// against the arena's current storage.
///
/// A staged offset may also be *absent*, the builder-side equivalent of a
/// null pointer. Assigning an absent offset to a [`RelPtr`] stores null.
pub struct StagedOffset<T> {
    arena: ArenaId,
    offset: Option<usize>,
    _target: PhantomData<fn() -> T>,
}

impl<T> StagedOffset<T> {
    pub(crate) fn new(arena: ArenaId, offset: usize) -> Self {
        Self {
            arena,
            offset: Some(offset),
            _target: PhantomData,
        }
    }

    /// An absent offset owned by `arena`.
    #[must_use]
    pub fn absent(arena: ArenaId) -> Self {
        Self {
            arena,
            offset: None,
            _target: PhantomData,
        }
    }

    /// The arena this offset belongs to.
    #[must_use]
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    /// Position of the record within the arena, or `None` if absent.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Whether this is an absent offset.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.offset.is_none()
    }

    /// Reinterprets the handle as pointing at a `U` at the same position.
    pub(crate) fn cast<U>(self) -> StagedOffset<U> {
        StagedOffset {
            arena: self.arena,
            offset: self.offset,
            _target: PhantomData,
        }
    }

    /// Moves the handle `delta` bytes forward and reinterprets it as a `U`.
    pub(crate) fn advance<U>(self, delta: usize) -> StagedOffset<U> {
        StagedOffset {
            arena: self.arena,
            offset: self.offset.map(|offset| offset + delta),
            _target: PhantomData,
        }
    }

    /// Stores a pointer to this record into `field`.
    ///
    /// `field` must be a relative pointer inside `arena`, and `self` must
    /// belong to the same arena. The stored displacement is the distance from
    /// the field to this record, or zero if `self` is absent.
    ///
    /// # Errors
    ///
    /// - [`Error::Ownership`] if either handle belongs to another arena or
    ///   `field` lies outside the arena's current bounds.
    /// - [`Error::Range`] if the displacement does not fit in `W`.
    pub fn assign_to<W: Width>(
        self,
        arena: &mut Arena,
        field: StagedOffset<RelPtr<T, W>>,
    ) -> Result<()>
    where
        T: 'static,
    {
        if self.arena != arena.id() {
            return Err(Error::Ownership);
        }
        let position = arena.locate(field, size_of::<W>())?;

        let raw = match self.offset {
            None => W::zeroed(),
            Some(target) => {
                let displacement = displacement(position, target);
                W::from_displacement(displacement).ok_or(Error::Range {
                    displacement,
                    bits: W::BITS,
                })?
            }
        };

        tracing::trace!(
            field = position,
            target = ?self.offset,
            bits = W::BITS,
            "assign relative pointer"
        );
        arena.write(field, RelPtr::<T, W>::from_raw(raw))
    }
}

#[expect(clippy::cast_possible_wrap)]
fn displacement(field: usize, target: usize) -> i64 {
    // Arena offsets are bounded by the allocation size, which never exceeds
    // `isize::MAX`.
    target as i64 - field as i64
}

impl<T> Clone for StagedOffset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StagedOffset<T> {}

impl<T> PartialEq for StagedOffset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.arena == other.arena && self.offset == other.offset
    }
}

impl<T> Eq for StagedOffset<T> {}

impl<T> fmt::Debug for StagedOffset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedOffset")
            .field("arena", &self.arena)
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
    struct Link {
        next: RelPtr<u32, i8>,
    }

    #[test]
    fn absent_offset_assigns_null() {
        let mut arena = Arena::new();
        let link = arena.allocate::<Link>();
        let field = arena.field(link, |l| &l.next).unwrap();

        // Dirty the field first so the null write is observable.
        arena.write(field, RelPtr::from_raw(5)).unwrap();
        StagedOffset::<u32>::absent(arena.id())
            .assign_to(&mut arena, field)
            .unwrap();

        assert!(arena.get(field).unwrap().is_null());
    }

    #[test]
    fn backward_displacement_is_negative() {
        let mut arena = Arena::new();
        let value = arena.allocate::<u32>();
        let link = arena.allocate::<Link>();
        let field = arena.field(link, |l| &l.next).unwrap();

        value.assign_to(&mut arena, field).unwrap();

        assert_eq!(arena.get(field).unwrap().displacement(), -4);
    }

    #[test]
    fn absent_offset_of_another_arena_is_rejected() {
        let other = Arena::new();
        let mut arena = Arena::new();
        let link = arena.allocate::<Link>();
        let field = arena.field(link, |l| &l.next).unwrap();

        let err = StagedOffset::<u32>::absent(other.id())
            .assign_to(&mut arena, field)
            .unwrap_err();

        assert_eq!(err, Error::Ownership);
    }

    #[test]
    fn cast_and_advance_keep_the_arena() {
        let arena = Arena::new();
        let base = StagedOffset::<u64>::new(arena.id(), 8);

        let moved: StagedOffset<u32> = base.advance(4);
        assert_eq!(moved.offset(), Some(12));
        assert_eq!(moved.arena(), arena.id());
        assert_eq!(base.cast::<u8>().offset(), Some(8));
        assert!(StagedOffset::<u8>::absent(arena.id()).advance::<u8>(4).is_absent());
    }
}
