use alloc::string::String;
use core::{cmp::Ordering, ffi::CStr, fmt};

use bstr::BStr;
use bytemuck::{Pod, Zeroable};

use crate::{
    error::{Error, Result},
    record::Record,
    rel_ptr::RelPtr,
    view::View,
};

/// Header of a length-prefixed, NUL-terminated byte string.
///
/// The header is followed by `len` bytes and a NUL that the length does not
/// count. Read it through a [`View`]`<TextRecord>`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
pub struct TextRecord {
    len: u32,
}

/// A relative pointer to a [`TextRecord`].
pub type Text = RelPtr<TextRecord>;

impl Record for TextRecord {
    fn trailing_len(&self) -> usize {
        (self.len as usize).saturating_add(1)
    }
}

impl<'a> View<'a, TextRecord> {
    /// Number of bytes, not counting the terminating NUL.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The text bytes, without the terminating NUL.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        let start = self.offset() + size_of::<TextRecord>();
        &self.bytes()[start..start + self.len()]
    }

    /// The text bytes including the terminating NUL.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &'a [u8] {
        let start = self.offset() + size_of::<TextRecord>();
        &self.bytes()[start..=start + self.len()]
    }

    /// The text as a byte string.
    #[must_use]
    pub fn as_bstr(&self) -> &'a BStr {
        BStr::new(self.as_bytes())
    }

    /// The text as UTF-8.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUtf8`] if the bytes are not valid UTF-8.
    pub fn to_str(&self) -> Result<&'a str> {
        core::str::from_utf8(self.as_bytes()).map_err(|_| Error::InvalidUtf8 {
            offset: self.offset(),
        })
    }

    /// The text as a C string, or `None` if it contains an interior NUL.
    #[must_use]
    pub fn as_c_str(&self) -> Option<&'a CStr> {
        CStr::from_bytes_with_nul(self.as_bytes_with_nul()).ok()
    }
}

impl fmt::Display for View<'_, TextRecord> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_bstr(), f)
    }
}

impl PartialEq for View<'_, TextRecord> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for View<'_, TextRecord> {}

impl PartialOrd for View<'_, TextRecord> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for View<'_, TextRecord> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

macro_rules! impl_text_cmp {
    ($($ty:ty),* $(,)?) => {$(
        impl PartialEq<$ty> for View<'_, TextRecord> {
            fn eq(&self, other: &$ty) -> bool {
                self.as_bytes() == AsRef::<[u8]>::as_ref(other)
            }
        }

        impl PartialEq<View<'_, TextRecord>> for $ty {
            fn eq(&self, other: &View<'_, TextRecord>) -> bool {
                AsRef::<[u8]>::as_ref(self) == other.as_bytes()
            }
        }

        impl PartialOrd<$ty> for View<'_, TextRecord> {
            fn partial_cmp(&self, other: &$ty) -> Option<Ordering> {
                Some(self.as_bytes().cmp(AsRef::<[u8]>::as_ref(other)))
            }
        }

        impl PartialOrd<View<'_, TextRecord>> for $ty {
            fn partial_cmp(&self, other: &View<'_, TextRecord>) -> Option<Ordering> {
                Some(AsRef::<[u8]>::as_ref(self).cmp(other.as_bytes()))
            }
        }
    )*};
}

impl_text_cmp!(str, &str, [u8], String, BStr);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arena;
    use alloc::string::ToString;
    use rstest::*;

    #[rstest]
    #[case::empty("")]
    #[case::ascii("Hello, world!")]
    #[case::multibyte("grüße, 世界")]
    fn text_reads_back(#[case] input: &str) {
        let mut arena = Arena::new();
        let at = arena.allocate_text(input).unwrap();
        let text = arena.view(at).unwrap();

        assert_eq!(text.len(), input.len());
        assert_eq!(text.is_empty(), input.is_empty());
        assert_eq!(text.to_str().unwrap(), input);
        assert_eq!(text, input);
        assert_eq!(text.to_string(), input);
        assert_eq!(text.as_c_str().unwrap().to_bytes(), input.as_bytes());
    }

    #[test]
    fn comparisons_are_bytewise() {
        let mut arena = Arena::new();
        let apple = arena.allocate_text("apple").unwrap();
        let banana = arena.allocate_text("banana").unwrap();
        let apple = arena.view(apple).unwrap();
        let banana = arena.view(banana).unwrap();

        assert!(apple < banana);
        assert!(apple < *"apples");
        assert!(apple > *"app");
        assert!(*"apple" == apple);
        assert!(apple == *b"apple".as_slice());
        assert!(apple == String::from("apple"));
        assert!(apple == *BStr::new("apple"));
        assert_ne!(apple, "Apple");
    }

    #[test]
    fn non_utf8_text() {
        let mut arena = Arena::new();
        let at = arena.allocate_text(b"caf\xe9").unwrap();
        let text = arena.view(at).unwrap();

        assert_eq!(text.to_str(), Err(Error::InvalidUtf8 { offset: 0 }));
        assert_eq!(text.to_string(), "caf\u{fffd}");
        assert_eq!(text.as_bstr(), BStr::new(b"caf\xe9"));
    }

    #[test]
    fn interior_nul_is_not_a_c_string() {
        let mut arena = Arena::new();
        let at = arena.allocate_text("a\0b").unwrap();
        let text = arena.view(at).unwrap();

        assert_eq!(text.len(), 3);
        assert!(text.as_c_str().is_none());
        assert_eq!(text.as_bytes_with_nul(), b"a\0b\0");
    }

    #[test]
    fn truncated_text_is_rejected() {
        let mut arena = Arena::new();
        arena.allocate_text("four").unwrap();
        let bytes = &arena.as_bytes()[..8];

        let err = View::<TextRecord>::root(bytes).unwrap_err();
        assert_eq!(
            err,
            Error::OutOfBounds {
                offset: 0,
                len: 9,
                size: 8
            }
        );
    }

    #[test]
    fn maximal_length_prefix_is_out_of_bounds() {
        let buffer = crate::Buffer::from_bytes(&u32::MAX.to_ne_bytes());
        let err = buffer.root::<TextRecord>().unwrap_err();
        assert_eq!(
            err,
            Error::OutOfBounds {
                offset: 0,
                len: size_of::<TextRecord>().saturating_add((u32::MAX as usize).saturating_add(1)),
                size: 4
            }
        );
    }
}
