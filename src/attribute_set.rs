use bitvec::prelude::*;
use std::fmt;

/// A collection of bits representing either device capability or state.
///
/// This can be used to iterate across all keys supported by a keyboard, or all buttons supported
/// by a joystick. You can also query directly whether a specific bit is set (corresponding to
/// whether a key or button is depressed).
pub struct AttributeSet<T: ArrayedEvdevEnum> {
    container: T::Array,
}

impl<T: ArrayedEvdevEnum> AttributeSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            container: T::zeroed_array(),
        }
    }

    #[inline]
    fn as_bitslice(&self) -> &BitSlice<u8> {
        T::array_as_slice(&self.container)
    }

    #[inline]
    fn as_mut_bitslice(&mut self) -> &mut BitSlice<u8> {
        T::array_as_mut_slice(&mut self.container)
    }

    /// The raw byte view the kernel state ioctls fill in.
    #[inline]
    pub(crate) fn as_mut_raw_slice(&mut self) -> &mut [u8] {
        T::array_as_buf(&mut self.container)
    }

    /// Returns `true` if this set contains the passed `T`.
    ///
    /// Constant-time, allocation-free.
    #[inline]
    pub fn contains(&self, attr: T) -> bool {
        self.as_bitslice().get(attr.to_index()).map_or(false, |b| *b)
    }

    #[inline]
    pub fn insert(&mut self, attr: T) {
        self.set(attr, true)
    }

    #[inline]
    pub fn remove(&mut self, attr: T) {
        self.set(attr, false)
    }

    #[inline]
    pub(crate) fn set(&mut self, attr: T, on: bool) {
        self.as_mut_bitslice().set(attr.to_index(), on)
    }

    /// Provides an iterator over all "set" bits in the collection.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.as_bitslice().iter_ones().map(T::from_index)
    }

    pub fn clear(&mut self) {
        self.as_mut_bitslice().fill(false)
    }

    /// Number of set bits.
    pub(crate) fn len(&self) -> usize {
        self.as_bitslice().count_ones()
    }
}

impl<T: ArrayedEvdevEnum> Clone for AttributeSet<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
        }
    }
    fn clone_from(&mut self, other: &Self) {
        self.container.clone_from(&other.container)
    }
}

impl<T: ArrayedEvdevEnum> Default for AttributeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ArrayedEvdevEnum + fmt::Debug> fmt::Debug for AttributeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: ArrayedEvdevEnum> PartialEq for AttributeSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bitslice() == other.as_bitslice()
    }
}
impl<T: ArrayedEvdevEnum> Eq for AttributeSet<T> {}

/// Integer-indexable constants: the indexing contract behind [`AttributeSet`]
/// and the name tables.
pub trait EvdevEnum: Copy + 'static {
    fn from_index(i: usize) -> Self;
    fn to_index(self) -> usize;
}

/// [`EvdevEnum`]s that know the fixed-size bit array backing their
/// [`AttributeSet`].
pub trait ArrayedEvdevEnum: EvdevEnum {
    type Array: Clone;
    fn zeroed_array() -> Self::Array;
    fn array_as_slice(arr: &Self::Array) -> &BitSlice<u8>;
    fn array_as_mut_slice(arr: &mut Self::Array) -> &mut BitSlice<u8>;
    fn array_as_buf(arr: &mut Self::Array) -> &mut [u8];
}

macro_rules! attribute_set_impl {
    ($t:ty, $cnt:expr) => {
        impl $crate::attribute_set::ArrayedEvdevEnum for $t {
            type Array = ::bitvec::BitArr!(for $cnt, in u8);
            fn zeroed_array() -> Self::Array {
                ::bitvec::array::BitArray::ZERO
            }
            fn array_as_slice(arr: &Self::Array) -> &::bitvec::slice::BitSlice<u8> {
                arr.as_bitslice()
            }
            fn array_as_mut_slice(arr: &mut Self::Array) -> &mut ::bitvec::slice::BitSlice<u8> {
                arr.as_mut_bitslice()
            }
            fn array_as_buf(arr: &mut Self::Array) -> &mut [u8] {
                arr.as_raw_mut_slice()
            }
        }
    };
}

macro_rules! evdev_enum {
    (@impl $t:ty, $pfx:literal, $($(#[$attr:meta])* $c:ident = $val:expr,)*) => {
        impl $t {
            $($(#[$attr])* pub const $c: Self = Self($val);)*

            /// Symbol table in declaration order. The first entry carrying a
            /// value is its canonical spelling; later entries for the same
            /// value are aliases.
            pub(crate) const NAMES: &'static [(&'static str, u16)] = &[
                $((concat!($pfx, stringify!($c)), $val),)*
            ];

            /// The canonical symbolic name for this value, or `None` for a
            /// value outside the table.
            pub fn name(self) -> Option<&'static str> {
                let code = self.0;
                Self::NAMES.iter().find(|&&(_, v)| v == code).map(|&(n, _)| n)
            }

            /// Looks up a value by its full symbolic name, prefix included.
            ///
            /// Matching is case-sensitive and exact. Where two spellings share
            /// a value, the first table entry wins.
            pub fn from_name(name: &str) -> Option<Self> {
                Self::NAMES.iter().find(|&&(n, _)| n == name).map(|&(_, v)| Self(v))
            }
        }
        impl ::std::fmt::Debug for $t {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                match self.name() {
                    Some(n) => f.pad(n),
                    None => write!(f, concat!(stringify!($t), "({})"), self.0),
                }
            }
        }
        impl $crate::attribute_set::EvdevEnum for $t {
            #[inline]
            fn from_index(i: usize) -> Self {
                Self(i as _)
            }
            #[inline]
            fn to_index(self) -> usize {
                self.0 as _
            }
        }
    };
    ($t:ty, prefix $pfx:literal, $($(#[$attr:meta])* $c:ident = $val:expr,)*) => {
        evdev_enum!(@impl $t, $pfx, $($(#[$attr])* $c = $val,)*);
    };
    ($t:ty, $($(#[$attr:meta])* $c:ident = $val:expr,)*) => {
        evdev_enum!(@impl $t, "", $($(#[$attr])* $c = $val,)*);
    };
}
