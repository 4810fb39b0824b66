/// Configuration for an [`Arena`](crate::Arena).
///
/// # Examples
///
/// ```rust
/// use pid_arena::{Arena, ArenaOptions};
///
/// let arena = Arena::with_options(ArenaOptions {
///     initial_capacity: 64 * 1024,
/// });
/// assert!(arena.is_empty());
/// ```
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaOptions {
    /// Number of bytes reserved up front.
    ///
    /// Reserving avoids reallocating the backing storage while a session
    /// grows. It has no effect on the bytes produced.
    ///
    /// # Default
    ///
    /// `0`
    pub initial_capacity: usize,
}

/// Configuration for an [`Encoder`](crate::Encoder).
///
/// Structural sharing never changes what a reader observes, only how many
/// bytes the finished buffer takes.
///
/// # Default
///
/// Both kinds of sharing are enabled.
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Whether content-equal texts encoded in one session share a single
    /// text record.
    ///
    /// # Default
    ///
    /// `true`
    pub deduplicate_text: bool,

    /// Whether content-equal sequences encoded in one session share a single
    /// sequence record.
    ///
    /// # Default
    ///
    /// `true`
    pub deduplicate_sequences: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            deduplicate_text: true,
            deduplicate_sequences: true,
        }
    }
}
