//! Typed read access to position-independent bytes.

use core::{fmt, ops::Deref};

use crate::{
    error::{Error, Result},
    record::{Record, field_offset},
    rel_ptr::{RelPtr, Width},
};

/// A validated, typed overlay of a record inside a byte slice.
///
/// A view is a `(bytes, offset)` pair. Creating one checks that the record,
/// including any trailing bytes it owns, lies inside `bytes` and that it
/// starts on an address aligned for `T`. After that, reading through the
/// view never parses or copies.
///
/// Views dereference to `T`. Relative pointers are followed with
/// [`View::load`], [`View::target`] or [`View::follow`], which resolve the
/// displacement against the same byte slice.
pub struct View<'a, T> {
    bytes: &'a [u8],
    offset: usize,
    record: &'a T,
}

impl<'a, T: Record> View<'a, T> {
    /// Overlays a `T` on `bytes` at `offset`.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfBounds`] if the record or its trailing bytes extend
    ///   past the end of `bytes`.
    /// - [`Error::Misaligned`] if `bytes[offset..]` is not aligned for `T`.
    pub fn new(bytes: &'a [u8], offset: usize) -> Result<Self> {
        let out_of_bounds = |len| Error::OutOfBounds {
            offset,
            len,
            size: bytes.len(),
        };

        let header = bytes
            .get(offset..)
            .and_then(|rest| rest.get(..size_of::<T>()))
            .ok_or_else(|| out_of_bounds(size_of::<T>()))?;
        let value: &T = bytemuck::try_from_bytes(header).map_err(|_| Error::Misaligned {
            offset,
            align: align_of::<T>(),
        })?;

        let extent = size_of::<T>().saturating_add(value.trailing_len());
        if bytes.len() - offset < extent {
            return Err(out_of_bounds(extent));
        }

        Ok(Self {
            bytes,
            offset,
            record: value,
        })
    }

    /// Overlays a `T` on the start of `bytes`.
    ///
    /// # Errors
    ///
    /// See [`View::new`].
    pub fn root(bytes: &'a [u8]) -> Result<Self> {
        Self::new(bytes, 0)
    }

    /// Views a field of this record.
    ///
    /// # Errors
    ///
    /// - [`Error::Ownership`] if `project` returns a reference that is not
    ///   part of the record.
    /// - Any error from [`View::new`] for the field.
    pub fn field<U: Record>(&self, project: impl FnOnce(&T) -> &U) -> Result<View<'a, U>> {
        let delta = field_offset(self.record, project(self.record)).ok_or(Error::Ownership)?;
        View::new(self.bytes, self.offset + delta)
    }

    /// Follows the relative pointer field selected by `project`.
    ///
    /// # Errors
    ///
    /// - [`Error::Null`] if the pointer is null.
    /// - Any error from [`View::field`] or [`View::target`].
    pub fn follow<U: Record, W: Width>(
        &self,
        project: impl FnOnce(&T) -> &RelPtr<U, W>,
    ) -> Result<View<'a, U>> {
        self.field(project)?.target()
    }
}

impl<'a, T> View<'a, T> {
    /// Builds a view of `value`, which must be a reference into `bytes`
    /// at `offset` whose extent was already checked.
    pub(crate) fn from_validated(bytes: &'a [u8], offset: usize, value: &'a T) -> Self {
        debug_assert_eq!(
            core::ptr::from_ref(value).addr(),
            bytes.as_ptr().addr() + offset
        );
        Self {
            bytes,
            offset,
            record: value,
        }
    }

    /// Views a field of this record without re-validating it.
    ///
    /// The field lies inside the record, and any trailing bytes it owns must
    /// be the record's own, so its extent is already checked.
    pub(crate) fn project<U>(&self, field: &'a U) -> View<'a, U> {
        let delta = field_offset(self.record, field).unwrap_or_else(|| {
            unreachable!("projected field lies outside its record");
        });
        View::from_validated(self.bytes, self.offset + delta, field)
    }

    /// Position of the record within the byte slice.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The byte slice the record is read from.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The record, borrowed for as long as the underlying bytes.
    #[must_use]
    pub fn into_ref(self) -> &'a T {
        self.record
    }
}

impl<'a, T: Record, W: Width> View<'a, RelPtr<T, W>> {
    /// Whether the pointer is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.record.is_null()
    }

    /// Follows the pointer, or returns `None` if it is null.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfBounds`] if the pointer leads outside the byte slice.
    /// - Any error from [`View::new`] for the target.
    pub fn load(&self) -> Result<Option<View<'a, T>>> {
        if self.record.is_null() {
            return Ok(None);
        }
        let displacement = self.record.displacement();
        let target = i64::try_from(self.offset)
            .ok()
            .and_then(|offset| offset.checked_add(displacement))
            .and_then(|target| usize::try_from(target).ok())
            .ok_or(Error::OutOfBounds {
                offset: self.offset,
                len: size_of::<T>(),
                size: self.bytes.len(),
            })?;
        View::new(self.bytes, target).map(Some)
    }

    /// Follows a pointer that must not be null.
    ///
    /// # Errors
    ///
    /// - [`Error::Null`] if the pointer is null.
    /// - Any error from [`View::load`].
    pub fn target(&self) -> Result<View<'a, T>> {
        self.load()?.ok_or(Error::Null {
            offset: self.offset,
        })
    }
}

impl<T> Deref for View<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.record
    }
}

impl<T> Clone for View<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for View<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for View<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("offset", &self.offset)
            .field("value", self.record)
            .finish()
    }
}
