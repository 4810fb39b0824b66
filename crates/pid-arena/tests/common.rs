#![allow(missing_docs)]
#![allow(dead_code)]

use core::fmt::Write;

use pid_arena::{Arena, Buffer};

/// Finishes `arena` and copies its bytes into a fresh buffer, dropping the
/// original storage so nothing can still point into it.
pub fn relocate(arena: Arena) -> Buffer {
    let built = arena.finish();
    let moved = Buffer::from_bytes(built.as_bytes());
    drop(built);
    moved
}

/// Renders bytes as space-separated groups of four hex-encoded bytes.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (index, chunk) in bytes.chunks(4).enumerate() {
        if index > 0 {
            out.push(' ');
        }
        for byte in chunk {
            write!(out, "{byte:02x}").unwrap();
        }
    }
    out
}

/// Whether the record a view points at starts on an address aligned for `T`.
pub fn is_aligned<T>(bytes: &[u8], offset: usize) -> bool {
    (bytes.as_ptr().addr() + offset) % align_of::<T>() == 0
}
