//! The relative pointer primitive.
//!
//! A [`RelPtr`] is a single signed integer stored inside a record. Zero means
//! null; any other value is the byte distance from the pointer's own position
//! to the start of its target. Because nothing absolute is stored, a buffer
//! full of relative pointers can be copied anywhere and still be read.

use core::{fmt, marker::PhantomData};

use bytemuck::{Pod, Zeroable};

mod sealed {
    pub trait Sealed {}
}

/// Storage width of a [`RelPtr`].
///
/// Implemented for `i8`, `i16`, `i32` and `i64`.
pub trait Width: sealed::Sealed + Pod + Eq + fmt::Debug {
    /// Number of bits in the stored displacement.
    const BITS: u32;

    /// Narrows a displacement, or returns `None` if it does not fit.
    fn from_displacement(displacement: i64) -> Option<Self>;

    /// Widens the stored displacement.
    fn to_displacement(self) -> i64;
}

macro_rules! impl_width {
    ($($ty:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Width for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[inline]
            fn from_displacement(displacement: i64) -> Option<Self> {
                <$ty>::try_from(displacement).ok()
            }

            #[inline]
            fn to_displacement(self) -> i64 {
                i64::from(self)
            }
        }
    )*};
}

impl_width!(i8, i16, i32, i64);

/// A self-relative pointer to a `T`, stored as a `W`.
///
/// `RelPtr` has no public mutator. It is populated through
/// [`StagedOffset::assign_to`](crate::StagedOffset::assign_to) (or
/// [`Arena::link`](crate::Arena::link)), which validates both the arena and
/// the displacement. Reading goes through a
/// [`View`](crate::View)`<RelPtr<T, W>>`.
///
/// A pointer cannot address the field it is stored in, since that
/// displacement is the null encoding.
#[repr(transparent)]
pub struct RelPtr<T, W: Width = i32> {
    raw: W,
    _target: PhantomData<fn() -> T>,
}

impl<T, W: Width> RelPtr<T, W> {
    /// A null pointer.
    #[must_use]
    pub fn null() -> Self {
        Self {
            raw: W::zeroed(),
            _target: PhantomData,
        }
    }

    /// Whether this pointer is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.raw == W::zeroed()
    }

    /// Byte distance from this field to its target; zero if null.
    #[must_use]
    pub fn displacement(&self) -> i64 {
        self.raw.to_displacement()
    }

    pub(crate) fn from_raw(raw: W) -> Self {
        Self {
            raw,
            _target: PhantomData,
        }
    }
}

impl<T, W: Width> Clone for RelPtr<T, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, W: Width> Copy for RelPtr<T, W> {}

impl<T, W: Width> PartialEq for RelPtr<T, W> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T, W: Width> Eq for RelPtr<T, W> {}

impl<T, W: Width> fmt::Debug for RelPtr<T, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("RelPtr(null)")
        } else {
            write!(f, "RelPtr({:+})", self.displacement())
        }
    }
}

impl<T, W: Width> Default for RelPtr<T, W> {
    fn default() -> Self {
        Self::null()
    }
}

// SAFETY: `RelPtr` is `repr(transparent)` over `W`, which is `Pod`. The
// marker is zero-sized and carries no data.
unsafe impl<T: 'static, W: Width> Zeroable for RelPtr<T, W> {}
// SAFETY: see above.
unsafe impl<T: 'static, W: Width> Pod for RelPtr<T, W> {}
