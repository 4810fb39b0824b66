use core::{
    ptr,
    sync::atomic::{AtomicUsize, Ordering},
};

use bytemuck::{AnyBitPattern, Pod};

use crate::{
    buffer::{Buffer, MAX_ALIGN},
    error::{Error, Result},
    map::{Entry, MapBuilder, MapKey},
    options::ArenaOptions,
    record::{Record, field_offset},
    rel_ptr::{RelPtr, Width},
    sequence::SequenceRecord,
    staged::StagedOffset,
    text::TextRecord,
    view::View,
};

static NEXT_ARENA_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of an [`Arena`], carried by every [`StagedOffset`] it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(usize);

impl ArenaId {
    fn next() -> Self {
        Self(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An append-only byte arena that position-independent records are built in.
///
/// Every allocation is zero-initialized, aligned for its type relative to
/// offset zero, and identified by a [`StagedOffset`]. The arena may move its
/// storage as it grows; staged offsets stay valid because they hold an
/// offset rather than an address.
///
/// When the build session is over, [`Arena::finish`] hands the bytes off as
/// an immutable [`Buffer`].
///
/// # Examples
///
/// ```rust
/// use pid_arena::{Arena, RelPtr, TextRecord};
///
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
/// struct Greeting {
///     id: u32,
///     text: RelPtr<TextRecord>,
/// }
/// impl pid_arena::Record for Greeting {}
///
/// let mut arena = Arena::new();
/// let root = arena.allocate::<Greeting>();
/// let text = arena.allocate_text("hello")?;
/// arena.get_mut(root)?.id = 7;
/// arena.link(root, |g| &g.text, text)?;
///
/// let buffer = arena.finish();
/// let greeting = buffer.root::<Greeting>()?;
/// assert_eq!(greeting.id, 7);
/// assert_eq!(greeting.follow(|g| &g.text)?, "hello");
/// # Ok::<(), pid_arena::Error>(())
/// ```
#[derive(Debug)]
pub struct Arena {
    id: ArenaId,
    buffer: Buffer,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ArenaOptions::default())
    }

    /// Creates an empty arena configured by `options`.
    #[must_use]
    pub fn with_options(options: ArenaOptions) -> Self {
        Self {
            id: ArenaId::next(),
            buffer: Buffer::with_capacity(options.initial_capacity),
        }
    }

    /// Identity carried by the offsets this arena hands out.
    #[must_use]
    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been allocated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// An absent offset owned by this arena.
    #[must_use]
    pub fn absent<T>(&self) -> StagedOffset<T> {
        StagedOffset::absent(self.id)
    }

    /// Reserves a zeroed `T` at the next offset aligned for `T`.
    pub fn allocate<T: AnyBitPattern>(&mut self) -> StagedOffset<T> {
        self.allocate_with_extra(0)
    }

    /// Reserves a zeroed `T` followed by `extra` zeroed bytes.
    ///
    /// The extra bytes hold variable-length content that belongs to the
    /// record, such as the characters of a [`TextRecord`].
    pub fn allocate_with_extra<T: AnyBitPattern>(&mut self, extra: usize) -> StagedOffset<T> {
        const {
            assert!(
                align_of::<T>() <= MAX_ALIGN,
                "record alignment exceeds MAX_ALIGN"
            );
        }

        let offset = self.len().next_multiple_of(align_of::<T>());
        self.buffer.resize(offset + size_of::<T>() + extra);
        tracing::trace!(offset, size = size_of::<T>(), extra, "allocate");
        StagedOffset::new(self.id, offset)
    }

    /// Appends a text record holding `text` and a terminating NUL.
    ///
    /// # Errors
    ///
    /// [`Error::LengthOverflow`] if the text is longer than `u32::MAX` bytes.
    pub fn allocate_text(&mut self, text: impl AsRef<[u8]>) -> Result<StagedOffset<TextRecord>> {
        let bytes = text.as_ref();
        let len = length_prefix(bytes.len())?;

        let record = self.allocate_with_extra::<TextRecord>(bytes.len() + 1);
        self.write(record.cast::<u32>(), len)?;
        let start = self.locate(record, size_of::<TextRecord>())? + size_of::<TextRecord>();
        self.buffer.as_bytes_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(record)
    }

    /// Appends a sequence record of `count` zeroed elements.
    ///
    /// # Errors
    ///
    /// [`Error::LengthOverflow`] if `count` does not fit the 32-bit length
    /// prefix.
    pub fn allocate_sequence<T: AnyBitPattern>(
        &mut self,
        count: usize,
    ) -> Result<StagedOffset<SequenceRecord<T>>> {
        let len = length_prefix(count)?;
        let extra = count
            .checked_mul(size_of::<T>())
            .ok_or(Error::LengthOverflow { len: count })?;

        let record = self.allocate_with_extra::<SequenceRecord<T>>(extra);
        self.write(record.cast::<u32>(), len)?;
        Ok(record)
    }

    /// Appends an ordered map record of `count` entries and returns the
    /// builder that fills it.
    ///
    /// # Errors
    ///
    /// [`Error::LengthOverflow`] if `count` does not fit the 32-bit length
    /// prefix.
    pub fn allocate_ordered_map<K: MapKey, V: AnyBitPattern>(
        &mut self,
        count: usize,
    ) -> Result<MapBuilder<K, V>> {
        let capacity = length_prefix(count)?;
        let entries = self.allocate_sequence::<Entry<K, V>>(count)?;
        Ok(MapBuilder::new(entries, capacity))
    }

    /// Converts a reference into this arena back into a staged offset.
    ///
    /// # Errors
    ///
    /// [`Error::Ownership`] if `value` does not lie entirely inside the
    /// arena's current storage.
    pub fn resolve<T: AnyBitPattern>(&self, value: &T) -> Result<StagedOffset<T>> {
        let base = self.as_bytes().as_ptr().addr();
        let address = ptr::from_ref(value).addr();
        match address.checked_sub(base) {
            Some(offset) if offset + size_of::<T>() <= self.len() => {
                Ok(StagedOffset::new(self.id, offset))
            }
            _ => Err(Error::Ownership),
        }
    }

    /// Returns a staged offset for a field of the record at `at`.
    ///
    /// # Errors
    ///
    /// - Any error from [`Arena::get`].
    /// - [`Error::Ownership`] if `project` returns a reference that is not
    ///   part of the record.
    pub fn field<T: AnyBitPattern, U: AnyBitPattern>(
        &self,
        at: StagedOffset<T>,
        project: impl FnOnce(&T) -> &U,
    ) -> Result<StagedOffset<U>> {
        let record = self.get(at)?;
        let delta = field_offset(record, project(record)).ok_or(Error::Ownership)?;
        Ok(at.advance(delta))
    }

    /// Points the relative pointer field selected by `project` at `target`.
    ///
    /// # Errors
    ///
    /// See [`Arena::field`] and [`StagedOffset::assign_to`].
    pub fn link<T: AnyBitPattern, U: 'static, W: Width>(
        &mut self,
        record: StagedOffset<T>,
        project: impl FnOnce(&T) -> &RelPtr<U, W>,
        target: StagedOffset<U>,
    ) -> Result<()> {
        let field = self.field(record, project)?;
        target.assign_to(self, field)
    }

    /// Reads the record at `at`.
    ///
    /// # Errors
    ///
    /// - [`Error::Ownership`] if `at` belongs to another arena.
    /// - [`Error::NotFound`] if `at` is absent.
    pub fn get<T: AnyBitPattern>(&self, at: StagedOffset<T>) -> Result<&T> {
        let offset = self.locate(at, size_of::<T>())?;
        bytemuck::try_from_bytes(&self.as_bytes()[offset..offset + size_of::<T>()])
            .map_err(|_| Error::Misaligned {
                offset,
                align: align_of::<T>(),
            })
    }

    /// Mutably borrows the record at `at`.
    ///
    /// # Errors
    ///
    /// See [`Arena::get`].
    pub fn get_mut<T: Pod>(&mut self, at: StagedOffset<T>) -> Result<&mut T> {
        let offset = self.locate(at, size_of::<T>())?;
        bytemuck::try_from_bytes_mut(&mut self.buffer.as_bytes_mut()[offset..offset + size_of::<T>()])
            .map_err(|_| Error::Misaligned {
                offset,
                align: align_of::<T>(),
            })
    }

    /// Overwrites the record at `at` with `value`.
    ///
    /// # Errors
    ///
    /// See [`Arena::get`].
    pub fn write<T: Pod>(&mut self, at: StagedOffset<T>, value: T) -> Result<()> {
        let offset = self.locate(at, size_of::<T>())?;
        self.buffer.as_bytes_mut()[offset..offset + size_of::<T>()]
            .copy_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Reads the record at `at` through a [`View`], following its trailing
    /// bytes and relative pointers within the bytes written so far.
    ///
    /// # Errors
    ///
    /// - [`Error::Ownership`] if `at` belongs to another arena.
    /// - [`Error::NotFound`] if `at` is absent.
    /// - Any error from [`View::new`].
    pub fn view<T: Record>(&self, at: StagedOffset<T>) -> Result<View<'_, T>> {
        let offset = self.locate(at, size_of::<T>())?;
        View::new(self.as_bytes(), offset)
    }

    /// Returns a staged offset for element `index` of a sequence.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `index` is past the end of the sequence.
    /// - Any error from [`Arena::get`].
    pub fn sequence_slot<T: AnyBitPattern>(
        &self,
        sequence: StagedOffset<SequenceRecord<T>>,
        index: usize,
    ) -> Result<StagedOffset<T>> {
        if index >= self.get(sequence)?.len() {
            return Err(Error::NotFound);
        }
        Ok(sequence.advance(size_of::<SequenceRecord<T>>() + index * size_of::<T>()))
    }

    /// Mutably borrows the elements of a sequence.
    ///
    /// # Errors
    ///
    /// See [`Arena::get`].
    pub fn elements_mut<T: Pod>(
        &mut self,
        sequence: StagedOffset<SequenceRecord<T>>,
    ) -> Result<&mut [T]> {
        let len = self.get(sequence)?.len();
        let start = self.locate(sequence, size_of::<SequenceRecord<T>>())?
            + size_of::<SequenceRecord<T>>();
        let bytes = self
            .buffer
            .as_bytes_mut()
            .get_mut(start..start + len * size_of::<T>())
            .ok_or(Error::Ownership)?;
        bytemuck::try_cast_slice_mut(bytes).map_err(|_| Error::Misaligned {
            offset: start,
            align: align_of::<T>(),
        })
    }

    /// Copies the bytes of `foreign` to the end of this arena.
    ///
    /// The copy starts at a [`MAX_ALIGN`] boundary, so every record in it
    /// keeps its alignment and every relative pointer inside it stays valid.
    /// The returned translator maps offsets staged in `foreign` to the copy.
    pub fn append_foreign(&mut self, foreign: &Arena) -> OffsetTranslator {
        let base = self.len().next_multiple_of(MAX_ALIGN);
        self.buffer.resize(base + foreign.len());
        self.buffer.as_bytes_mut()[base..].copy_from_slice(foreign.as_bytes());

        tracing::debug!(
            foreign = ?foreign.id,
            base,
            len = foreign.len(),
            "append foreign arena"
        );
        OffsetTranslator {
            from: foreign.id,
            to: self.id,
            base,
        }
    }

    /// Ends the build session and hands the bytes off.
    #[must_use]
    pub fn finish(self) -> Buffer {
        tracing::debug!(arena = ?self.id, len = self.len(), "finish arena");
        self.buffer
    }

    /// Checks that `len` bytes at `at` are inside this arena and returns
    /// their position.
    pub(crate) fn locate<T>(&self, at: StagedOffset<T>, len: usize) -> Result<usize> {
        if at.arena() != self.id {
            return Err(Error::Ownership);
        }
        let offset = at.offset().ok_or(Error::NotFound)?;
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(offset),
            _ => Err(Error::Ownership),
        }
    }

    /// Zeroes the record at `at`.
    pub(crate) fn clear<T>(&mut self, at: StagedOffset<T>) -> Result<()> {
        let offset = self.locate(at, size_of::<T>())?;
        self.buffer.as_bytes_mut()[offset..offset + size_of::<T>()].fill(0);
        Ok(())
    }
}

fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::LengthOverflow { len })
}

/// Maps offsets staged in one arena to a copy of its bytes in another.
///
/// Returned by [`Arena::append_foreign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTranslator {
    from: ArenaId,
    to: ArenaId,
    base: usize,
}

impl OffsetTranslator {
    /// Position of the copied bytes in the destination arena.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Maps `staged` from the foreign arena to the destination arena.
    ///
    /// Absent offsets stay absent.
    ///
    /// # Errors
    ///
    /// [`Error::Ownership`] if `staged` was not handed out by the foreign
    /// arena.
    pub fn translate<T>(&self, staged: StagedOffset<T>) -> Result<StagedOffset<T>> {
        if staged.arena() != self.from {
            return Err(Error::Ownership);
        }
        Ok(match staged.offset() {
            Some(offset) => StagedOffset::new(self.to, self.base + offset),
            None => StagedOffset::absent(self.to),
        })
    }
}
