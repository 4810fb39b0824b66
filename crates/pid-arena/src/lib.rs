//! Zero-copy, position-independent binary data built on relative pointers.
//!
//! Values are written once into an append-only [`Arena`]. Records refer to
//! each other through [`RelPtr`]s, which store the distance from the pointer
//! to its target instead of an address. The finished [`Buffer`] can be copied
//! to any address, process or file and read back in place through typed
//! [`View`]s without a deserialization pass.
//!
//! Three composite layouts are built in:
//!
//! - [`TextRecord`]: a length-prefixed, NUL-terminated byte string.
//! - [`SequenceRecord`]: a length-prefixed array.
//! - [`OrderedMapRecord`]: a sequence of key/value entries sorted by key and
//!   searched by bisection, filled through a [`MapBuilder`].
//!
//! Native values are written with an [`Encoder`] (or [`to_buffer`]) and read
//! back with [`from_bytes`] or directly through views:
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use pid_arena::{OrderedMap, Text};
//!
//! let scores = BTreeMap::from([("ada".to_string(), 36_u32), ("grace".to_string(), 85)]);
//! let buffer = pid_arena::to_buffer(&scores)?;
//!
//! // Copy the bytes somewhere else and read them without decoding.
//! let moved = pid_arena::Buffer::from_bytes(buffer.as_bytes());
//! let map = moved.root::<OrderedMap<Text, u32>>()?.target()?;
//! assert_eq!(*map.at("grace")?, 85);
//!
//! // Or decode into native values.
//! let decoded: BTreeMap<String, u32> = pid_arena::from_bytes(moved.as_bytes())?;
//! assert_eq!(decoded, scores);
//! # Ok::<(), pid_arena::Error>(())
//! ```
//!
//! The byte layout is native-endian and carries no header or version.

#![no_std]
extern crate alloc;

#[cfg(test)]
extern crate std;

mod arena;
mod buffer;
mod encoder;
mod error;
mod map;
mod mapping;
mod options;
mod record;
mod rel_ptr;
mod sequence;
mod staged;
mod text;
mod view;

#[cfg(test)]
mod tests;

pub use arena::{Arena, ArenaId, OffsetTranslator};
pub use buffer::{Buffer, MAX_ALIGN};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use map::{Entry, MapBuilder, MapKey, OrderedMap, OrderedMapRecord};
pub use mapping::{Decode, DecodeOptional, Encode, EncodeOptional, OptionalScalar, Place};
pub use options::{ArenaOptions, EncoderOptions};
pub use record::Record;
pub use rel_ptr::{RelPtr, Width};
pub use sequence::{Sequence, SequenceRecord};
pub use staged::StagedOffset;
pub use text::{Text, TextRecord};
pub use view::View;

/// Encodes `value` into a fresh buffer whose first record is its root.
///
/// # Errors
///
/// Any error raised while encoding.
pub fn to_buffer<T: Encode + ?Sized>(value: &T) -> Result<Buffer> {
    let mut arena = Arena::new();
    Encoder::new(&mut arena).encode_root(value)?;
    Ok(arena.finish())
}

/// Decodes the root record at the start of `bytes`.
///
/// `bytes` must be aligned like the buffer it was produced in; copy it into
/// a [`Buffer`] with [`Buffer::from_bytes`] if that is not guaranteed.
///
/// # Errors
///
/// Any error raised while validating or following records.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T> {
    T::decode(View::root(bytes)?)
}
