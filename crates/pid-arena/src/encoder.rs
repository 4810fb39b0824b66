use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};
use core::{
    any::{Any, TypeId},
    marker::PhantomData,
};

use crate::{
    arena::Arena,
    error::Result,
    map::{MapKey, OrderedMapRecord},
    mapping::{Encode, Place},
    options::EncoderOptions,
    sequence::SequenceRecord,
    staged::StagedOffset,
    text::TextRecord,
};

type Cache<K, P> = BTreeMap<K, StagedOffset<P>>;

/// Recursively writes native values into an [`Arena`].
///
/// An encoder is one build session. Within it, texts and sequences with
/// equal content are written once and shared by every pointer that refers to
/// them. Ordered maps are always written fresh. All texts share one cache.
/// Sequences are cached per native element type (see [`Encode::Native`]),
/// so a `Vec<u8>` never shares a record with a sequence of a `u8`-backed
/// enum.
///
/// # Examples
///
/// ```rust
/// use pid_arena::{Arena, Encoder};
///
/// let mut arena = Arena::new();
/// let mut encoder = Encoder::new(&mut arena);
/// let names = vec!["ada", "grace", "ada"];
/// let root = encoder.encode_root(&names)?;
///
/// let sequence = arena.view(root)?.target()?;
/// assert_eq!(sequence.len(), 3);
/// // Equal texts are stored once.
/// let first = sequence.element(0).target()?;
/// let last = sequence.element(2).target()?;
/// assert_eq!(first.offset(), last.offset());
/// # Ok::<(), pid_arena::Error>(())
/// ```
pub struct Encoder<'a> {
    arena: &'a mut Arena,
    options: EncoderOptions,
    caches: BTreeMap<TypeId, Box<dyn Any>>,
}

impl<'a> Encoder<'a> {
    /// Starts a session writing into `arena`.
    pub fn new(arena: &'a mut Arena) -> Self {
        Self::with_options(arena, EncoderOptions::default())
    }

    /// Starts a session writing into `arena`, configured by `options`.
    pub fn with_options(arena: &'a mut Arena, options: EncoderOptions) -> Self {
        Self {
            arena,
            options,
            caches: BTreeMap::new(),
        }
    }

    /// The options this session was started with.
    #[must_use]
    pub fn options(&self) -> EncoderOptions {
        self.options
    }

    /// The arena being written.
    pub fn arena(&mut self) -> &mut Arena {
        self.arena
    }

    /// Encodes `value` and returns what an enclosing record stores for it.
    ///
    /// # Errors
    ///
    /// Any error raised while allocating or linking records.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<T::Output> {
        value.encode(self)
    }

    /// Allocates a root slot, encodes `value` and stores it in the slot.
    ///
    /// The slot is allocated before anything `value` refers to, so in an
    /// empty arena the root is the record at offset zero.
    ///
    /// # Errors
    ///
    /// See [`Encoder::encode`].
    pub fn encode_root<T: Encode + ?Sized>(&mut self, value: &T) -> Result<StagedOffset<T::Pid>> {
        let root = self.arena.allocate::<T::Pid>();
        let output = value.encode(self)?;
        output.place(self.arena, root)?;
        Ok(root)
    }

    /// Writes a text record, reusing an earlier one with the same bytes.
    pub(crate) fn text(&mut self, bytes: &[u8]) -> Result<StagedOffset<TextRecord>> {
        if !self.options.deduplicate_text {
            return self.arena.allocate_text(bytes);
        }
        if let Some(&text) = self.cache::<[u8], Vec<u8>, TextRecord>().get(bytes) {
            tracing::trace!(len = bytes.len(), offset = ?text.offset(), "text cache hit");
            return Ok(text);
        }

        tracing::trace!(len = bytes.len(), "text cache miss");
        let text = self.arena.allocate_text(bytes)?;
        self.cache::<[u8], Vec<u8>, TextRecord>()
            .insert(bytes.to_vec(), text);
        Ok(text)
    }

    /// Writes a sequence record, reusing an earlier one with equal elements.
    pub(crate) fn sequence<T: Encode>(
        &mut self,
        items: &[T],
    ) -> Result<StagedOffset<SequenceRecord<T::Pid>>> {
        if !self.options.deduplicate_sequences {
            return self.write_sequence(items);
        }
        let key: Vec<T::Key> = items.iter().map(Encode::cache_key).collect();
        if let Some(&sequence) = self
            .cache::<T::Native, Vec<T::Key>, SequenceRecord<T::Pid>>()
            .get(&key)
        {
            tracing::trace!(len = items.len(), offset = ?sequence.offset(), "sequence cache hit");
            return Ok(sequence);
        }

        tracing::trace!(len = items.len(), "sequence cache miss");
        let sequence = self.write_sequence(items)?;
        self.cache::<T::Native, Vec<T::Key>, SequenceRecord<T::Pid>>()
            .insert(key, sequence);
        Ok(sequence)
    }

    fn write_sequence<T: Encode>(
        &mut self,
        items: &[T],
    ) -> Result<StagedOffset<SequenceRecord<T::Pid>>> {
        let sequence = self.arena.allocate_sequence::<T::Pid>(items.len())?;
        for (index, item) in items.iter().enumerate() {
            let output = item.encode(self)?;
            let slot = self.arena.sequence_slot(sequence, index)?;
            output.place(self.arena, slot)?;
        }
        Ok(sequence)
    }

    /// Writes an ordered map record from entries in ascending key order.
    pub(crate) fn ordered_map<'m, K, V>(
        &mut self,
        entries: impl ExactSizeIterator<Item = (&'m K, &'m V)>,
    ) -> Result<StagedOffset<OrderedMapRecord<K::Pid, V::Pid>>>
    where
        K: Encode + 'm,
        V: Encode + 'm,
        K::Pid: MapKey,
    {
        let mut builder = self
            .arena
            .allocate_ordered_map::<K::Pid, V::Pid>(entries.len())?;
        for (key, value) in entries {
            let key = key.encode(self)?;
            let slot = builder.add_key(self.arena, key)?;
            let value = value.encode(self)?;
            value.place(self.arena, slot)?;
        }
        builder.finish()
    }

    /// The cache for records of type `P` written for values of native type
    /// `N`, keyed by content `K`.
    fn cache<N: ?Sized + 'static, K: Ord + 'static, P: 'static>(&mut self) -> &mut Cache<K, P> {
        let cache = self
            .caches
            .entry(TypeId::of::<(PhantomData<N>, Cache<K, P>)>())
            .or_insert_with(|| Box::new(Cache::<K, P>::new()) as Box<dyn Any>);
        (**cache)
            .downcast_mut()
            .unwrap_or_else(|| unreachable!("cache registry is keyed by the cache type"))
    }
}

impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("arena", &self.arena.id())
            .field("options", &self.options)
            .field("caches", &self.caches.len())
            .finish()
    }
}
