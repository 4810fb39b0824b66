use core::ptr;

use bytemuck::{AnyBitPattern, Pod};

use crate::rel_ptr::{RelPtr, Width};

/// A type that can be overlaid on buffer bytes by a [`View`](crate::View).
///
/// Fixed-size records implement this with an empty body:
///
/// ```rust
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl pid_arena::Record for Point {}
/// ```
///
/// Variable-length records (text and sequences) report the bytes that follow
/// their header so a view can check the whole extent up front.
pub trait Record: AnyBitPattern {
    /// Number of bytes belonging to this record past `size_of::<Self>()`.
    fn trailing_len(&self) -> usize {
        0
    }
}

macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(impl Record for $ty {})*
    };
}

impl_record!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl<T: Record + Pod, const N: usize> Record for [T; N] {}

impl<T: 'static, W: Width> Record for RelPtr<T, W> {}

/// Byte distance from `base` to `field`, if `field` lies inside `base`.
pub(crate) fn field_offset<T, U>(base: &T, field: &U) -> Option<usize> {
    let delta = ptr::from_ref(field)
        .addr()
        .checked_sub(ptr::from_ref(base).addr())?;
    (delta + size_of::<U>() <= size_of::<T>()).then_some(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct Pair {
        a: u8,
        b: u32,
    }

    #[test]
    fn field_offset_follows_layout() {
        let pair = Pair { a: 1, b: 2 };
        assert_eq!(field_offset(&pair, &pair.a), Some(0));
        assert_eq!(field_offset(&pair, &pair.b), Some(4));
    }

    #[test]
    fn field_offset_rejects_unrelated_references() {
        let pair = Pair { a: 1, b: 2 };
        let other = 3_u32;
        assert_eq!(field_offset(&pair, &other), None);
        assert_eq!(field_offset(&pair.a, &pair), None);
    }
}
