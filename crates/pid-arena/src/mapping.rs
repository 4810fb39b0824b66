//! Correspondence between native value shapes and their on-buffer form.
//!
//! | native shape               | on-buffer representation               |
//! |----------------------------|----------------------------------------|
//! | integer, float, enum       | stored inline by value                 |
//! | `str`, `String`, `BString` | [`Text`]                               |
//! | `[T]`, `Vec<T>`            | [`Sequence`]`<T::Pid>`                 |
//! | `BTreeMap<K, V>`           | [`OrderedMap`]`<K::Pid, V::Pid>`       |
//! | `Option<T>`, `T` scalar    | [`OptionalScalar`]`<T>`                |
//! | `Option<T>`, `T` pointer   | the same pointer as `T`, null if absent|

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec::Vec,
};
use core::marker::PhantomData;

use bstr::{BStr, BString};
use bytemuck::{AnyBitPattern, Pod, Zeroable};

use crate::{
    arena::Arena,
    encoder::Encoder,
    error::Result,
    map::{MapKey, OrderedMap, OrderedMapRecord},
    record::Record,
    rel_ptr::{RelPtr, Width},
    sequence::{Sequence, SequenceRecord},
    staged::StagedOffset,
    text::{Text, TextRecord},
    view::View,
};

/// A builder-side value that can be stored into a slot of type `P`.
///
/// Scalars write themselves, staged offsets become relative pointers, and
/// optional scalars write a value and a presence flag.
pub trait Place<P> {
    /// Stores `self` into the slot at `at`.
    ///
    /// # Errors
    ///
    /// Any error from writing to the arena or assigning a pointer.
    fn place(self, arena: &mut Arena, at: StagedOffset<P>) -> Result<()>;
}

impl<P: Pod> Place<P> for P {
    fn place(self, arena: &mut Arena, at: StagedOffset<P>) -> Result<()> {
        arena.write(at, self)
    }
}

impl<T: 'static, W: Width> Place<RelPtr<T, W>> for StagedOffset<T> {
    fn place(self, arena: &mut Arena, at: StagedOffset<RelPtr<T, W>>) -> Result<()> {
        self.assign_to(arena, at)
    }
}

impl<T: Pod> Place<OptionalScalar<T>> for Option<T> {
    fn place(self, arena: &mut Arena, at: StagedOffset<OptionalScalar<T>>) -> Result<()> {
        let value = arena.field(at, |optional| &optional.value)?;
        let present = arena.field(at, |optional| &optional.present)?;
        arena.write(value, self.unwrap_or_else(T::zeroed))?;
        arena.write(present, u8::from(self.is_some()))
    }
}

/// An inline scalar with a presence flag.
///
/// The value comes first, followed by a one-byte flag that is non-zero when
/// the value is present.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct OptionalScalar<T> {
    value: T,
    present: u8,
}

impl<T: Copy> OptionalScalar<T> {
    /// The value, if present.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.is_some().then_some(self.value)
    }

    /// Whether a value is present.
    #[must_use]
    pub fn is_some(&self) -> bool {
        self.present != 0
    }
}

// SAFETY: both fields are zeroable; zero means absent.
unsafe impl<T: Zeroable> Zeroable for OptionalScalar<T> {}
// SAFETY: `repr(C)`, both fields accept any bit pattern. Trailing padding is
// never read as part of `T`.
unsafe impl<T: AnyBitPattern> AnyBitPattern for OptionalScalar<T> {}

impl<T: Record> Record for OptionalScalar<T> {}

/// A native value that can be written into an [`Arena`].
///
/// Encoding yields an [`Output`](Self::Output), which an enclosing record
/// stores into a slot of type [`Pid`](Self::Pid): scalars by value, and
/// everything else as a relative pointer to a record encoded first.
pub trait Encode {
    /// On-buffer representation stored in an enclosing record.
    type Pid: Record;

    /// What encoding produces, placed into a `Pid` slot.
    type Output: Place<Self::Pid>;

    /// Content key identifying equal values for structural sharing.
    type Key: Ord + 'static;

    /// Native type whose values share a cache namespace. Borrowed forms
    /// name the type they borrow, so `&str` and `str` share one.
    type Native: ?Sized + 'static;

    /// Writes any records this value needs and returns what to store in
    /// its slot.
    ///
    /// # Errors
    ///
    /// Any error raised while allocating or linking records.
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Self::Output>;

    /// The content key of this value.
    fn cache_key(&self) -> Self::Key;
}

/// A native value that can be encoded inside an `Option`.
pub trait EncodeOptional: Encode {
    /// On-buffer representation of `Option<Self>`.
    type OptionalPid: Record;

    /// What encoding `Option<Self>` produces.
    type OptionalOutput: Place<Self::OptionalPid>;

    /// Encodes a value that may be absent.
    ///
    /// # Errors
    ///
    /// See [`Encode::encode`].
    fn encode_optional(
        value: Option<&Self>,
        encoder: &mut Encoder<'_>,
    ) -> Result<Self::OptionalOutput>;
}

/// A native value that can be read back from a [`View`].
pub trait Decode: Sized {
    /// On-buffer representation read from.
    type Pid: Record;

    /// Materializes a native value.
    ///
    /// # Errors
    ///
    /// Any error raised while following pointers or validating text.
    fn decode(view: View<'_, Self::Pid>) -> Result<Self>;
}

/// A native value that can be read back from inside an `Option`.
pub trait DecodeOptional: Decode {
    /// On-buffer representation of `Option<Self>`.
    type OptionalPid: Record;

    /// Materializes a value that may be absent.
    ///
    /// # Errors
    ///
    /// See [`Decode::decode`].
    fn decode_optional(view: View<'_, Self::OptionalPid>) -> Result<Option<Self>>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $key:ty, |$value:ident| $to_key:expr;)*) => {$(
        impl Encode for $ty {
            type Pid = $ty;
            type Output = $ty;
            type Key = $key;
            type Native = $ty;

            fn encode(&self, _: &mut Encoder<'_>) -> Result<$ty> {
                Ok(*self)
            }

            fn cache_key(&self) -> $key {
                let $value = *self;
                $to_key
            }
        }

        impl EncodeOptional for $ty {
            type OptionalPid = OptionalScalar<$ty>;
            type OptionalOutput = Option<$ty>;

            fn encode_optional(value: Option<&Self>, _: &mut Encoder<'_>) -> Result<Option<$ty>> {
                Ok(value.copied())
            }
        }

        impl Decode for $ty {
            type Pid = $ty;

            fn decode(view: View<'_, $ty>) -> Result<Self> {
                Ok(*view)
            }
        }

        impl DecodeOptional for $ty {
            type OptionalPid = OptionalScalar<$ty>;

            fn decode_optional(view: View<'_, OptionalScalar<$ty>>) -> Result<Option<Self>> {
                Ok(view.get())
            }
        }
    )*};
}

impl_scalar! {
    u8 => u8, |v| v;
    u16 => u16, |v| v;
    u32 => u32, |v| v;
    u64 => u64, |v| v;
    i8 => i8, |v| v;
    i16 => i16, |v| v;
    i32 => i32, |v| v;
    i64 => i64, |v| v;
    f32 => u32, |v| v.to_bits();
    f64 => u64, |v| v.to_bits();
}

impl<T: Encode + ?Sized> Encode for &T {
    type Pid = T::Pid;
    type Output = T::Output;
    type Key = T::Key;
    type Native = T::Native;

    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<T::Output> {
        (**self).encode(encoder)
    }

    fn cache_key(&self) -> T::Key {
        (**self).cache_key()
    }
}

impl<T: EncodeOptional> Encode for Option<T> {
    type Pid = T::OptionalPid;
    type Output = T::OptionalOutput;
    type Key = Option<T::Key>;
    type Native = Option<PhantomData<T::Native>>;

    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<T::OptionalOutput> {
        T::encode_optional(self.as_ref(), encoder)
    }

    fn cache_key(&self) -> Option<T::Key> {
        self.as_ref().map(Encode::cache_key)
    }
}

impl<T: DecodeOptional> Decode for Option<T> {
    type Pid = T::OptionalPid;

    fn decode(view: View<'_, T::OptionalPid>) -> Result<Self> {
        T::decode_optional(view)
    }
}

/// Encodes a pointer-shaped value that may be absent as a possibly null
/// pointer.
fn encode_pointer<T: Encode<Output = StagedOffset<R>> + ?Sized, R>(
    value: Option<&T>,
    encoder: &mut Encoder<'_>,
) -> Result<StagedOffset<R>> {
    match value {
        Some(value) => value.encode(encoder),
        None => Ok(encoder.arena().absent()),
    }
}

macro_rules! impl_text {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode for $ty {
            type Pid = Text;
            type Output = StagedOffset<TextRecord>;
            type Key = Vec<u8>;
            type Native = $ty;

            fn encode(&self, encoder: &mut Encoder<'_>) -> Result<StagedOffset<TextRecord>> {
                encoder.text(AsRef::<[u8]>::as_ref(self))
            }

            fn cache_key(&self) -> Vec<u8> {
                AsRef::<[u8]>::as_ref(self).to_vec()
            }
        }
    )*};
}

impl_text!(str, String, BStr, BString);

impl EncodeOptional for String {
    type OptionalPid = Text;
    type OptionalOutput = StagedOffset<TextRecord>;

    fn encode_optional(
        value: Option<&Self>,
        encoder: &mut Encoder<'_>,
    ) -> Result<StagedOffset<TextRecord>> {
        encode_pointer(value, encoder)
    }
}

impl EncodeOptional for BString {
    type OptionalPid = Text;
    type OptionalOutput = StagedOffset<TextRecord>;

    fn encode_optional(
        value: Option<&Self>,
        encoder: &mut Encoder<'_>,
    ) -> Result<StagedOffset<TextRecord>> {
        encode_pointer(value, encoder)
    }
}

impl Decode for String {
    type Pid = Text;

    fn decode(view: View<'_, Text>) -> Result<Self> {
        Ok(view.target()?.to_str()?.to_string())
    }
}

impl DecodeOptional for String {
    type OptionalPid = Text;

    fn decode_optional(view: View<'_, Text>) -> Result<Option<Self>> {
        view.load()?
            .map(|text| text.to_str().map(ToString::to_string))
            .transpose()
    }
}

impl Decode for BString {
    type Pid = Text;

    fn decode(view: View<'_, Text>) -> Result<Self> {
        Ok(BString::from(view.target()?.as_bytes()))
    }
}

impl DecodeOptional for BString {
    type OptionalPid = Text;

    fn decode_optional(view: View<'_, Text>) -> Result<Option<Self>> {
        Ok(view.load()?.map(|text| BString::from(text.as_bytes())))
    }
}

impl<T: Encode> Encode for [T] {
    type Pid = Sequence<T::Pid>;
    type Output = StagedOffset<SequenceRecord<T::Pid>>;
    type Key = Vec<T::Key>;
    type Native = [PhantomData<T::Native>];

    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Self::Output> {
        encoder.sequence(self)
    }

    fn cache_key(&self) -> Vec<T::Key> {
        self.iter().map(Encode::cache_key).collect()
    }
}

impl<T: Encode> Encode for Vec<T> {
    type Pid = Sequence<T::Pid>;
    type Output = StagedOffset<SequenceRecord<T::Pid>>;
    type Key = Vec<T::Key>;
    type Native = [PhantomData<T::Native>];

    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Self::Output> {
        self.as_slice().encode(encoder)
    }

    fn cache_key(&self) -> Vec<T::Key> {
        self.as_slice().cache_key()
    }
}

impl<T: Encode> EncodeOptional for Vec<T> {
    type OptionalPid = Sequence<T::Pid>;
    type OptionalOutput = StagedOffset<SequenceRecord<T::Pid>>;

    fn encode_optional(
        value: Option<&Self>,
        encoder: &mut Encoder<'_>,
    ) -> Result<Self::OptionalOutput> {
        encode_pointer(value, encoder)
    }
}

fn decode_sequence<T: Decode>(sequence: View<'_, SequenceRecord<T::Pid>>) -> Result<Vec<T>> {
    sequence.iter().map(T::decode).collect()
}

impl<T: Decode> Decode for Vec<T> {
    type Pid = Sequence<T::Pid>;

    fn decode(view: View<'_, Self::Pid>) -> Result<Self> {
        decode_sequence(view.target()?)
    }
}

impl<T: Decode> DecodeOptional for Vec<T> {
    type OptionalPid = Sequence<T::Pid>;

    fn decode_optional(view: View<'_, Self::OptionalPid>) -> Result<Option<Self>> {
        view.load()?.map(decode_sequence).transpose()
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V>
where
    K::Pid: MapKey,
{
    type Pid = OrderedMap<K::Pid, V::Pid>;
    type Output = StagedOffset<OrderedMapRecord<K::Pid, V::Pid>>;
    type Key = Vec<(K::Key, V::Key)>;
    type Native = BTreeMap<PhantomData<K::Native>, PhantomData<V::Native>>;

    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Self::Output> {
        encoder.ordered_map(self.iter())
    }

    fn cache_key(&self) -> Self::Key {
        self.iter()
            .map(|(key, value)| (key.cache_key(), value.cache_key()))
            .collect()
    }
}

impl<K: Encode, V: Encode> EncodeOptional for BTreeMap<K, V>
where
    K::Pid: MapKey,
{
    type OptionalPid = OrderedMap<K::Pid, V::Pid>;
    type OptionalOutput = StagedOffset<OrderedMapRecord<K::Pid, V::Pid>>;

    fn encode_optional(
        value: Option<&Self>,
        encoder: &mut Encoder<'_>,
    ) -> Result<Self::OptionalOutput> {
        encode_pointer(value, encoder)
    }
}

fn decode_map<K: Decode + Ord, V: Decode>(
    map: View<'_, OrderedMapRecord<K::Pid, V::Pid>>,
) -> Result<BTreeMap<K, V>>
where
    K::Pid: MapKey,
{
    map.iter()
        .map(|entry| -> Result<(K, V)> {
            Ok((K::decode(entry.key())?, V::decode(entry.value())?))
        })
        .collect()
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V>
where
    K::Pid: MapKey,
{
    type Pid = OrderedMap<K::Pid, V::Pid>;

    fn decode(view: View<'_, Self::Pid>) -> Result<Self> {
        decode_map(view.target()?)
    }
}

impl<K: Decode + Ord, V: Decode> DecodeOptional for BTreeMap<K, V>
where
    K::Pid: MapKey,
{
    type OptionalPid = OrderedMap<K::Pid, V::Pid>;

    fn decode_optional(view: View<'_, Self::OptionalPid>) -> Result<Option<Self>> {
        view.load()?.map(decode_map).transpose()
    }
}

/// Declares a fieldless enum stored inline as its primitive representation.
///
/// The enum gets `#[repr(..)]`, `Clone` and `Copy`, and implements
/// [`Encode`], [`EncodeOptional`], [`Decode`] and [`DecodeOptional`].
/// Decoding a discriminant that names no variant fails with
/// [`Error::UnknownVariant`](crate::Error::UnknownVariant).
///
/// ```rust
/// pid_arena::scalar_enum! {
///     #[derive(Debug, PartialEq)]
///     pub enum Suit: u8 {
///         Clubs,
///         Diamonds,
///         Hearts = 7,
///         Spades,
///     }
/// }
///
/// let buffer = pid_arena::to_buffer(&Suit::Spades)?;
/// assert_eq!(buffer.as_bytes(), &[8]);
/// assert_eq!(pid_arena::from_bytes::<Suit>(buffer.as_bytes())?, Suit::Spades);
/// # Ok::<(), pid_arena::Error>(())
/// ```
#[macro_export]
macro_rules! scalar_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ident {
            $($(#[$variant_meta:meta])* $variant:ident $(= $value:expr)?),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr($repr)]
        #[derive(Clone, Copy)]
        $vis enum $name {
            $($(#[$variant_meta])* $variant $(= $value)?),*
        }

        impl $name {
            fn from_repr(value: $repr) -> ::core::option::Option<Self> {
                $(
                    if value == Self::$variant as $repr {
                        return ::core::option::Option::Some(Self::$variant);
                    }
                )*
                ::core::option::Option::None
            }
        }

        impl $crate::Encode for $name {
            type Pid = $repr;
            type Output = $repr;
            type Key = $repr;
            type Native = Self;

            fn encode(&self, _: &mut $crate::Encoder<'_>) -> $crate::Result<$repr> {
                ::core::result::Result::Ok(*self as $repr)
            }

            fn cache_key(&self) -> $repr {
                *self as $repr
            }
        }

        impl $crate::EncodeOptional for $name {
            type OptionalPid = $crate::OptionalScalar<$repr>;
            type OptionalOutput = ::core::option::Option<$repr>;

            fn encode_optional(
                value: ::core::option::Option<&Self>,
                _: &mut $crate::Encoder<'_>,
            ) -> $crate::Result<::core::option::Option<$repr>> {
                ::core::result::Result::Ok(value.map(|value| *value as $repr))
            }
        }

        impl $crate::Decode for $name {
            type Pid = $repr;

            fn decode(view: $crate::View<'_, $repr>) -> $crate::Result<Self> {
                Self::from_repr(*view).ok_or($crate::Error::UnknownVariant {
                    offset: view.offset(),
                })
            }
        }

        impl $crate::DecodeOptional for $name {
            type OptionalPid = $crate::OptionalScalar<$repr>;

            fn decode_optional(
                view: $crate::View<'_, $crate::OptionalScalar<$repr>>,
            ) -> $crate::Result<::core::option::Option<Self>> {
                match view.get() {
                    ::core::option::Option::Some(value) => Self::from_repr(value)
                        .map(::core::option::Option::Some)
                        .ok_or($crate::Error::UnknownVariant {
                            offset: view.offset(),
                        }),
                    ::core::option::Option::None => {
                        ::core::result::Result::Ok(::core::option::Option::None)
                    }
                }
            }
        }
    };
}
