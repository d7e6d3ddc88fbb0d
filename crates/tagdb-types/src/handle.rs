//! Tag indices and the `Handle` addressing contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::code::TypeCode;
use crate::error::{TypeError, TypeResult};

/// Size of an encoded [`Handle`] on the wire.
pub const HANDLE_WIRE_SIZE: usize = 21;

/// Stable identifier of a tag. Indices are assigned sequentially and never
/// reused, so a stale index can only ever miss, never alias a newer tag.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagIndex(i32);

impl TagIndex {
    /// The reserved status tag at handle 0.
    pub const STATUS: Self = Self(0);

    /// Wrap a raw index.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw index value.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// The index after this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for TagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagIndex({})", self.0)
    }
}

impl fmt::Display for TagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bit range inside the store, plus the type and element count it holds.
///
/// `byte` is the absolute store byte of the first element and `bit` the bit
/// within that byte (always zero unless the type is `BOOL`). `size` is the
/// number of bytes the range touches, including partial leading and trailing
/// bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub index: TagIndex,
    pub byte: u32,
    pub bit: u8,
    pub count: u32,
    pub size: u32,
    #[serde(rename = "type")]
    pub type_code: TypeCode,
}

impl Handle {
    /// Build a handle for `count` elements of `elem_bits` each, starting at
    /// the absolute `bit_address`.
    ///
    /// Callers guarantee the range lies inside a store, whose byte capacity
    /// never exceeds `u32::MAX`.
    pub fn new(
        index: TagIndex,
        bit_address: u64,
        type_code: TypeCode,
        count: u32,
        elem_bits: u64,
    ) -> Self {
        let bit = (bit_address % 8) as u8;
        Self {
            index,
            byte: (bit_address / 8) as u32,
            bit,
            count,
            size: span_bytes(bit, elem_bits * u64::from(count)) as u32,
            type_code,
        }
    }

    /// Absolute bit address of the first element.
    pub fn bit_address(&self) -> u64 {
        u64::from(self.byte) * 8 + u64::from(self.bit)
    }

    /// One past the last byte the handle touches.
    pub fn end_byte(&self) -> u64 {
        u64::from(self.byte) + u64::from(self.size)
    }

    /// Returns `true` if `[offset, offset + len)` shares a byte with this handle.
    pub fn overlaps_bytes(&self, offset: u64, len: u64) -> bool {
        len > 0 && offset < self.end_byte() && u64::from(self.byte) < offset + len
    }

    /// A handle over elements `first..first + count` of this one.
    pub fn subrange(&self, first: u32, count: u32, elem_bits: u64) -> TypeResult<Self> {
        if count == 0 {
            return Err(TypeError::ZeroCount);
        }
        let in_range = first
            .checked_add(count)
            .is_some_and(|end| end <= self.count);
        if !in_range {
            return Err(TypeError::RangeOutOfBounds {
                first,
                count,
                limit: self.count,
            });
        }
        let start = self.bit_address() + u64::from(first) * elem_bits;
        Ok(Self::new(self.index, start, self.type_code, count, elem_bits))
    }

    /// Encode as the fixed 21-byte little-endian wire layout.
    pub fn to_wire(&self) -> TypeResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode from the wire layout produced by [`Handle::to_wire`].
    pub fn from_wire(bytes: &[u8]) -> TypeResult<Self> {
        if bytes.len() != HANDLE_WIRE_SIZE {
            return Err(TypeError::Serialization(format!(
                "handle must be {HANDLE_WIRE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// Number of bytes touched by `bits` bits starting at `bit` within a byte.
pub const fn span_bytes(bit: u8, bits: u64) -> u64 {
    (bit as u64 + bits).div_ceil(8)
}
