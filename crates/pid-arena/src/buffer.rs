use alloc::vec::Vec;
use core::fmt;

use bytemuck::Zeroable;

use crate::{
    error::Result,
    record::Record,
    view::View,
};

/// Largest alignment a storable record may require.
///
/// The backing storage of every [`Arena`](crate::Arena) and [`Buffer`] starts
/// at an address aligned to this value, so alignment computed relative to
/// offset zero is also alignment in memory.
pub const MAX_ALIGN: usize = 8;

/// A finished, immutable run of position-independent bytes.
///
/// The bytes contain no absolute addresses. They can be written anywhere
/// and read back in place through [`View`]s, either from this buffer or from
/// any other suitably aligned byte slice holding the same bytes.
#[derive(Clone, Default)]
pub struct Buffer {
    words: Vec<u64>,
    len: usize,
}

impl Buffer {
    pub(crate) fn with_capacity(bytes: usize) -> Self {
        Self {
            words: Vec::with_capacity(bytes.div_ceil(MAX_ALIGN)),
            len: 0,
        }
    }

    /// Copies `bytes` into freshly aligned storage.
    ///
    /// This is how a buffer received from elsewhere (a file, a socket, a
    /// slice at an arbitrary address) is relocated before reading it.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(bytes.len());
        buffer.resize(bytes.len());
        buffer.as_bytes_mut().copy_from_slice(bytes);
        buffer
    }

    /// The buffer contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }

    /// Number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes the buffer can hold without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.capacity() * MAX_ALIGN
    }

    /// Reads the record at offset zero.
    ///
    /// # Errors
    ///
    /// See [`View::new`].
    pub fn root<T: Record>(&self) -> Result<View<'_, T>> {
        View::root(self.as_bytes())
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// See [`View::new`].
    pub fn view<T: Record>(&self, offset: usize) -> Result<View<'_, T>> {
        View::new(self.as_bytes(), offset)
    }

    /// Grows or shrinks the buffer to `len` bytes. New bytes are zero.
    pub(crate) fn resize(&mut self, len: usize) {
        let words = len.div_ceil(MAX_ALIGN);
        if len < self.len {
            // Keep the invariant that bytes past `len` are zero.
            let tail = &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[len..self.len];
            tail.fill(0);
        }
        if words > self.words.capacity() {
            tracing::debug!(
                from = self.capacity(),
                to = words * MAX_ALIGN,
                "reallocate backing storage"
            );
        }
        self.words.resize(words, u64::zeroed());
        self.len = len;
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("len", &self.len).finish()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Buffer {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn storage_is_max_aligned() {
        let buffer = Buffer::from_bytes(&[1, 2, 3]);
        assert_eq!(buffer.as_bytes().as_ptr().addr() % MAX_ALIGN, 0);
        assert_eq!(buffer.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn growth_zero_fills() {
        let mut buffer = Buffer::from_bytes(&[0xff; 5]);
        buffer.resize(11);
        assert_eq!(buffer.len(), 11);
        assert_eq!(&buffer.as_bytes()[5..], &[0; 6]);
    }

    #[test]
    fn shrinking_then_growing_does_not_resurrect_bytes() {
        let mut buffer = Buffer::from_bytes(&[0xff; 7]);
        buffer.resize(2);
        buffer.resize(7);
        assert_eq!(buffer.as_bytes(), &[0xff, 0xff, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn relocated_copy_compares_equal() {
        let bytes = vec![9_u8; 17];
        // Read from an odd address to make sure the copy realigns.
        let padded = [&[0_u8][..], &bytes[..]].concat();
        let buffer = Buffer::from_bytes(&padded[1..]);
        assert_eq!(buffer, Buffer::from_bytes(&bytes));
        assert!(buffer.capacity() >= 17);
    }
}
