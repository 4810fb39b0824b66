use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while building or reading position-independent data.
///
/// Every error is raised to the immediate caller. Bytes appended to an
/// [`Arena`](crate::Arena) before the failure stay in place; a session that
/// fails mid-build is expected to be discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A key or index is absent from a map or sequence.
    #[error("not found")]
    NotFound,

    /// A map builder already holds as many entries as it declared.
    #[error("map builder is full ({capacity} entries)")]
    CapacityExceeded {
        /// Declared number of entries.
        capacity: u32,
    },

    /// A map key is not strictly greater than the key inserted before it.
    #[error("key at index {index} is not strictly greater than the previous key")]
    OrderingViolation {
        /// Slot the rejected key was meant to occupy.
        index: u32,
    },

    /// A displacement does not fit the width of a relative pointer.
    #[error("displacement {displacement} does not fit a {bits}-bit relative pointer")]
    Range {
        /// Byte distance from the pointer field to its target.
        displacement: i64,
        /// Width of the pointer field.
        bits: u32,
    },

    /// A staged offset or reference was used against an arena that did not
    /// produce it, or lies outside its current bounds.
    #[error("offset does not belong to this arena")]
    Ownership,

    /// A length does not fit the 32-bit length prefix of a record.
    #[error("length {len} does not fit a 32-bit length prefix")]
    LengthOverflow {
        /// Requested length.
        len: usize,
    },

    /// A record extends past the end of the byte slice it is read from.
    #[error("record at offset {offset} ({len} bytes) exceeds buffer of {size} bytes")]
    OutOfBounds {
        /// Start of the record.
        offset: usize,
        /// Number of bytes the record needs.
        len: usize,
        /// Size of the byte slice.
        size: usize,
    },

    /// A record does not start on its required alignment.
    #[error("record at offset {offset} is not aligned to {align} bytes")]
    Misaligned {
        /// Start of the record.
        offset: usize,
        /// Required alignment.
        align: usize,
    },

    /// A non-optional relative pointer is null.
    #[error("null relative pointer at offset {offset}")]
    Null {
        /// Position of the pointer field.
        offset: usize,
    },

    /// Text bytes are not valid UTF-8.
    #[error("text at offset {offset} is not valid UTF-8")]
    InvalidUtf8 {
        /// Start of the text record.
        offset: usize,
    },

    /// A stored discriminant matches no variant of a scalar enum.
    #[error("unknown enum discriminant at offset {offset}")]
    UnknownVariant {
        /// Position of the discriminant.
        offset: usize,
    },

    /// A map builder was finished before every declared slot was filled.
    #[error("map builder finished with {filled} of {capacity} entries")]
    Underfilled {
        /// Number of inserted keys.
        filled: u32,
        /// Declared number of entries.
        capacity: u32,
    },
}
