// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Helpers for pulling bits and words out of a memory map.

use crate::Error;

/// Extract a bit from a byte.
pub const fn extract_bit(word: u8, bit: u8) -> Result<bool, Error> {
    if bit > 7 {
        return Err(Error::BitOutOfRange);
    }
    Ok((word & (1 << bit)) != 0)
}

/// Return `word` with `bit` set or cleared.
pub const fn assign_bit(word: u8, bit: u8, set: bool) -> Result<u8, Error> {
    if bit > 7 {
        return Err(Error::BitOutOfRange);
    }
    if set {
        Ok(word | (1 << bit))
    } else {
        Ok(word & !(1 << bit))
    }
}

/// Assemble a big-endian 16-bit word from the start of `buf`.
pub fn be_u16(buf: &[u8]) -> Result<u16, Error> {
    fixed::<2>(buf).map(u16::from_be_bytes)
}

/// Assemble a little-endian 16-bit word from the start of `buf`.
pub fn le_u16(buf: &[u8]) -> Result<u16, Error> {
    fixed::<2>(buf).map(u16::from_le_bytes)
}

/// Assemble a big-endian 32-bit word from the start of `buf`.
pub fn be_u32(buf: &[u8]) -> Result<u32, Error> {
    fixed::<4>(buf).map(u32::from_be_bytes)
}

/// Assemble a little-endian 32-bit word from the start of `buf`.
pub fn le_u32(buf: &[u8]) -> Result<u32, Error> {
    fixed::<4>(buf).map(u32::from_le_bytes)
}

/// Assemble an unsigned big-endian value of up to four bytes.
///
/// Options fields are one, two or four bytes wide depending on the family,
/// and are reported as a single integer.
pub fn be_uint(buf: &[u8]) -> Result<u32, Error> {
    if buf.is_empty() || buf.len() > 4 {
        return Err(Error::ShortField {
            needed: 4,
            actual: buf.len(),
        });
    }
    Ok(buf.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Copy the first `N` bytes of `buf` into an array.
pub fn fixed<const N: usize>(buf: &[u8]) -> Result<[u8; N], Error> {
    buf.get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::ShortField {
            needed: N,
            actual: buf.len(),
        })
}

mod private {
    pub trait ScalableSealed: Sized + Copy + Into<f64> {}
}

/// A 16-bit register value that can be scaled into a physical quantity.
pub trait Scalable: private::ScalableSealed {
    fn from_bytes(buf: [u8; 2]) -> Self;
}

impl private::ScalableSealed for i16 {}

impl Scalable for i16 {
    fn from_bytes(buf: [u8; 2]) -> Self {
        Self::from_be_bytes(buf)
    }
}

impl private::ScalableSealed for u16 {}

impl Scalable for u16 {
    fn from_bytes(buf: [u8; 2]) -> Self {
        Self::from_be_bytes(buf)
    }
}

/// Decode a big-endian 2-byte word into a float with a defined scale factor.
pub fn decode_with_scale<T: Scalable>(buf: [u8; 2], scale: f64) -> f64 {
    T::from_bytes(buf).into() * scale
}

/// Generate an enum from a field of bits within a single byte.
///
/// The generated type carries `MASK`, `HIGH_BIT` and `LOW_BIT` constants, a
/// `TryFrom<u8>` implementation that extracts and matches the field from a
/// whole byte, a `From<$name> for u8` returning the unshifted field value,
/// and a `Display` implementation.
///
/// # Example
/// ```ignore
/// media_decode::bitfield_enum! {
///     name = Completion,
///     description = "Completion state, in bits 3:2.",
///     bits = 3:2,
///     variants = {
///         0b00, Idle, "idle",
///         0b01, Done, "done",
///     },
/// }
/// ```
#[macro_export]
macro_rules! bitfield_enum {
    (
        name = $name:ident,
        description = $docstring:literal,
        bits = $high_bit:literal : $low_bit:literal,
        variants = { $( $bits:literal, $variant:ident, $display:literal $(,)? ),+ }
        $(,)?
    ) => {
        static_assertions::const_assert!($high_bit < 8);
        static_assertions::const_assert!($low_bit <= $high_bit);

        // Each pattern must fit in the field once shifted into place.
        $( static_assertions::const_assert_eq!(
            ((($bits as u16) << $low_bit) as u8) & !$name::MASK,
            0
        ); )+

        impl $name {
            #[allow(dead_code)]
            pub const HIGH_BIT: u8 = $high_bit;
            #[allow(dead_code)]
            pub const LOW_BIT: u8 = $low_bit;
            pub const MASK: u8 = (0xff << $low_bit) & (0xff >> (7 - $high_bit));
        }

        #[doc = $docstring]
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[cfg_attr(
            any(feature = "api-traits", test),
            derive(schemars::JsonSchema, serde::Deserialize, serde::Serialize)
        )]
        pub enum $name {
            $($variant),+
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                use $name::*;
                match self {
                    $( $variant => write!(f, "{}", $display), )+
                }
            }
        }

        impl ::core::convert::TryFrom<u8> for $name {
            type Error = $crate::Error;

            fn try_from(x: u8) -> Result<Self, $crate::Error> {
                use $name::*;
                match (x & Self::MASK) >> $low_bit {
                    $( $bits => Ok($variant), )+
                    _ => Err($crate::Error::InvalidBitField),
                }
            }
        }

        impl ::core::convert::From<$name> for u8 {
            fn from(x: $name) -> u8 {
                use $name::*;
                match x {
                    $( $variant => $bits, )+
                }
            }
        }
    };
}
