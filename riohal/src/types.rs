// This file is part of riohal, a user-space hardware abstraction layer for RIO FPGA devices.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// riohal is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// riohal is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Scalar element kinds carried by registers and FIFOs.
//!
//! A [`Type`] only records the shape of an element: how many bits the hardware uses, how many
//! bytes it occupies in host memory and whether it is signed. Equality is structural, so a
//! single-precision float and an `I32` compare equal, exactly as the hardware sees them.
//!
//! The host-side Rust types that may be moved in and out of the device implement the sealed
//! [`Element`] trait, which ties each of them to its [`Type`].

use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    logical_bits: u32,
    element_bytes: usize,
    signed: bool,
}

impl Type {
    /// Marker for catalogue entries that cannot be accessed (clusters, strings, fixed-point).
    pub const UNSUPPORTED: Type = Type::new(0, 0, false);
    pub const BOOL: Type = Type::new(1, 1, false);
    pub const I8: Type = Type::new(8, 1, true);
    pub const U8: Type = Type::new(8, 1, false);
    pub const I16: Type = Type::new(16, 2, true);
    pub const U16: Type = Type::new(16, 2, false);
    pub const I32: Type = Type::new(32, 4, true);
    pub const U32: Type = Type::new(32, 4, false);
    pub const I64: Type = Type::new(64, 8, true);
    pub const U64: Type = Type::new(64, 8, false);
    pub const SGL: Type = Type::new(32, 4, true);
    pub const DBL: Type = Type::new(64, 8, true);

    const fn new(logical_bits: u32, element_bytes: usize, signed: bool) -> Type {
        Type {
            logical_bits,
            element_bytes,
            signed,
        }
    }

    pub fn logical_bits(&self) -> u32 {
        self.logical_bits
    }

    pub fn element_bytes(&self) -> usize {
        self.element_bytes
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_supported(&self) -> bool {
        *self != Type::UNSUPPORTED
    }

    /// Human readable name. Shapes shared by an integer and a float report both.
    pub fn describe(&self) -> &'static str {
        match (self.logical_bits, self.element_bytes, self.signed) {
            (0, _, _) => "Unsupported",
            (1, _, _) => "Bool",
            (8, _, true) => "I8",
            (8, _, false) => "U8",
            (16, _, true) => "I16",
            (16, _, false) => "U16",
            (32, _, true) => "I32/Sgl",
            (32, _, false) => "U32",
            (64, _, true) => "I64/Dbl",
            (64, _, false) => "U64",
            _ => "Unknown",
        }
    }
}

/// A boolean as the hardware stores it: one byte, zero for false.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FpgaBool(pub u8);

impl From<bool> for FpgaBool {
    fn from(b: bool) -> Self {
        FpgaBool(u8::from(b))
    }
}

impl From<FpgaBool> for bool {
    fn from(b: FpgaBool) -> Self {
        b.0 != 0
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A host type that can be transferred to or from a register or FIFO.
///
/// Implemented only for plain integer and float types (and [`FpgaBool`]), which have no padding
/// and accept every bit pattern, so element slices can be viewed as raw bytes.
pub trait Element: sealed::Sealed + Copy + Default + Debug + Send + Sync + 'static {
    const TYPE: Type;

    /// The value as it sits in the low bits of a 32-bit register slot.
    fn to_slot(self) -> u32;

    /// Recover a value from a 32-bit register slot.
    fn from_slot(slot: u32) -> Self;
}

macro_rules! integer_element {
    ($t:ty, $ty_const:expr, $via:ty) => {
        impl sealed::Sealed for $t {}
        impl Element for $t {
            const TYPE: Type = $ty_const;

            fn to_slot(self) -> u32 {
                self as $via as u32
            }

            fn from_slot(slot: u32) -> Self {
                slot as $t
            }
        }
    };
}

integer_element!(i8, Type::I8, i32);
integer_element!(u8, Type::U8, u32);
integer_element!(i16, Type::I16, i32);
integer_element!(u16, Type::U16, u32);
integer_element!(i32, Type::I32, i32);
integer_element!(u32, Type::U32, u32);
integer_element!(i64, Type::I64, i64);
integer_element!(u64, Type::U64, u64);

impl sealed::Sealed for FpgaBool {}
impl Element for FpgaBool {
    const TYPE: Type = Type::BOOL;

    fn to_slot(self) -> u32 {
        u32::from(self.0 != 0)
    }

    fn from_slot(slot: u32) -> Self {
        FpgaBool(u8::from(slot & 1 != 0))
    }
}

impl sealed::Sealed for f32 {}
impl Element for f32 {
    const TYPE: Type = Type::SGL;

    fn to_slot(self) -> u32 {
        self.to_bits()
    }

    fn from_slot(slot: u32) -> Self {
        f32::from_bits(slot)
    }
}

impl sealed::Sealed for f64 {}
impl Element for f64 {
    const TYPE: Type = Type::DBL;

    fn to_slot(self) -> u32 {
        // 64-bit values never travel through a 32-bit slot
        self.to_bits() as u32
    }

    fn from_slot(slot: u32) -> Self {
        f64::from(f32::from_bits(slot))
    }
}

/// View a slice of elements as its bytes in host order.
pub fn bytes_of<T: Element>(values: &[T]) -> &[u8] {
    // SAFETY: Element is sealed to padding-free plain data types; the byte length covers
    // exactly the memory of `values`.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}

/// View a mutable slice of elements as its bytes in host order.
pub fn bytes_of_mut<T: Element>(values: &mut [T]) -> &mut [u8] {
    let len = std::mem::size_of_val(values);
    // SAFETY: as for `bytes_of`; additionally every bit pattern is a valid Element, so any bytes
    // written through the view leave `values` valid.
    unsafe { std::slice::from_raw_parts_mut(values.as_mut_ptr().cast::<u8>(), len) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::rstest;

    #[gtest]
    #[rstest]
    #[case::bool(Type::BOOL, 1, 1, false)]
    #[case::i8(Type::I8, 8, 1, true)]
    #[case::u16(Type::U16, 16, 2, false)]
    #[case::u32(Type::U32, 32, 4, false)]
    #[case::i64(Type::I64, 64, 8, true)]
    #[case::dbl(Type::DBL, 64, 8, true)]
    #[case::unsupported(Type::UNSUPPORTED, 0, 0, false)]
    fn type_shapes(
        #[case] ty: Type,
        #[case] bits: u32,
        #[case] bytes: usize,
        #[case] signed: bool,
    ) {
        expect_that!(ty.logical_bits(), eq(bits));
        expect_that!(ty.element_bytes(), eq(bytes));
        expect_that!(ty.is_signed(), eq(signed));
    }

    #[gtest]
    fn equality_is_structural() {
        expect_that!(Type::SGL, eq(Type::I32));
        expect_that!(Type::U8, not(eq(Type::BOOL)));
        expect_that!(Type::UNSUPPORTED.is_supported(), eq(false));
    }

    #[gtest]
    fn element_types_match_their_rust_size() {
        expect_that!(<u16 as Element>::TYPE.element_bytes(), eq(std::mem::size_of::<u16>()));
        expect_that!(<f64 as Element>::TYPE.element_bytes(), eq(std::mem::size_of::<f64>()));
        expect_that!(<FpgaBool as Element>::TYPE.element_bytes(), eq(1));
    }

    #[gtest]
    fn signed_values_sign_extend_into_slot() {
        expect_that!((-1i8).to_slot(), eq(0xFFFF_FFFF));
        expect_that!(i8::from_slot(0xFFFF_FFFF), eq(-1));
        expect_that!(u16::from_slot(0x1234_5678), eq(0x5678));
        expect_that!(1.5f32.to_slot(), eq(1.5f32.to_bits()));
        expect_that!(bool::from(FpgaBool::from_slot(3)), eq(true));
    }

    #[gtest]
    fn byte_views_cover_the_slice() {
        let mut values = [0u32, 0u32];
        bytes_of_mut(&mut values)[4] = 7;
        expect_that!(bytes_of(&values).len(), eq(8));
        expect_that!(bytes_of(&values)[4], eq(7));
        expect_that!(values[0], eq(0));
    }
}
