//! Type codes: the 32-bit encoding every subsystem uses to describe a tag's
//! element type.
//!
//! The low nibble of a primitive code is the base-2 exponent of its bit
//! width (`0` is one bit, `3` is a byte, `6` is 64 bits). The high bits are
//! flags: [`COMPOUND_FLAG`] marks a user-defined compound type whose
//! remaining bits index the type registry, and [`QUEUE_FLAG`] marks a queue
//! variant of any other type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flag bit marking a compound (user-defined) type.
pub const COMPOUND_FLAG: u32 = 0x8000_0000;

/// Flag bit marking a queue variant.
pub const QUEUE_FLAG: u32 = 0x4000_0000;

const WIDTH_MASK: u32 = 0x0F;

/// Round `value` up to the next multiple of `align` (`align` must be non-zero).
pub const fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// A raw 32-bit type code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCode(u32);

impl TypeCode {
    pub const BOOL: Self = Self(0x0010);
    pub const BYTE: Self = Self(0x0003);
    pub const SINT: Self = Self(0x0013);
    pub const CHAR: Self = Self(0x0023);
    pub const WORD: Self = Self(0x0004);
    pub const INT: Self = Self(0x0014);
    pub const UINT: Self = Self(0x0024);
    pub const DWORD: Self = Self(0x0005);
    pub const DINT: Self = Self(0x0015);
    pub const UDINT: Self = Self(0x0025);
    pub const REAL: Self = Self(0x0035);
    pub const LWORD: Self = Self(0x0006);
    pub const LINT: Self = Self(0x0016);
    pub const ULINT: Self = Self(0x0026);
    pub const TIME: Self = Self(0x0036);
    pub const LREAL: Self = Self(0x0046);

    /// Wrap a raw code without checking it.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The code for the compound type stored at `index` in a registry.
    pub const fn compound(index: u32) -> Self {
        Self(COMPOUND_FLAG | index)
    }

    /// The raw 32-bit value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if the compound flag is set.
    pub const fn is_compound(self) -> bool {
        self.0 & COMPOUND_FLAG != 0
    }

    /// Returns `true` if the queue flag is set.
    pub const fn is_queue(self) -> bool {
        self.0 & QUEUE_FLAG != 0
    }

    /// This code with the queue flag cleared.
    pub const fn without_queue(self) -> Self {
        Self(self.0 & !QUEUE_FLAG)
    }

    /// This code with the queue flag set.
    pub const fn with_queue(self) -> Self {
        Self(self.0 | QUEUE_FLAG)
    }

    /// Registry index of a compound code, ignoring the queue flag.
    pub const fn compound_index(self) -> Option<usize> {
        if self.is_compound() {
            Some((self.0 & !(COMPOUND_FLAG | QUEUE_FLAG)) as usize)
        } else {
            None
        }
    }

    /// The primitive this code denotes, if any. The queue flag is ignored.
    pub fn primitive(self) -> Option<Primitive> {
        Primitive::from_code(self)
    }

    /// Returns `true` for single-bit booleans.
    pub fn is_bool(self) -> bool {
        self.without_queue() == Self::BOOL
    }
}

impl fmt::Debug for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeCode({self})")
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.primitive(), self.compound_index()) {
            (Some(p), _) => f.write_str(p.name())?,
            (None, Some(index)) => write!(f, "CDT#{index}")?,
            (None, None) => write!(f, "{:#010x}", self.0)?,
        }
        if self.is_queue() {
            f.write_str("[queue]")?;
        }
        Ok(())
    }
}

impl From<Primitive> for TypeCode {
    fn from(p: Primitive) -> Self {
        p.code()
    }
}

/// The fixed-width IEC 61131 element types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Bool,
    Byte,
    Sint,
    Char,
    Word,
    Int,
    Uint,
    Dword,
    Dint,
    Udint,
    Real,
    Lword,
    Lint,
    Ulint,
    Time,
    Lreal,
}

impl Primitive {
    /// Every primitive, in code order.
    pub const ALL: [Primitive; 16] = [
        Primitive::Bool,
        Primitive::Byte,
        Primitive::Sint,
        Primitive::Char,
        Primitive::Word,
        Primitive::Int,
        Primitive::Uint,
        Primitive::Dword,
        Primitive::Dint,
        Primitive::Udint,
        Primitive::Real,
        Primitive::Lword,
        Primitive::Lint,
        Primitive::Ulint,
        Primitive::Time,
        Primitive::Lreal,
    ];

    /// The type code of this primitive.
    pub const fn code(self) -> TypeCode {
        match self {
            Primitive::Bool => TypeCode::BOOL,
            Primitive::Byte => TypeCode::BYTE,
            Primitive::Sint => TypeCode::SINT,
            Primitive::Char => TypeCode::CHAR,
            Primitive::Word => TypeCode::WORD,
            Primitive::Int => TypeCode::INT,
            Primitive::Uint => TypeCode::UINT,
            Primitive::Dword => TypeCode::DWORD,
            Primitive::Dint => TypeCode::DINT,
            Primitive::Udint => TypeCode::UDINT,
            Primitive::Real => TypeCode::REAL,
            Primitive::Lword => TypeCode::LWORD,
            Primitive::Lint => TypeCode::LINT,
            Primitive::Ulint => TypeCode::ULINT,
            Primitive::Time => TypeCode::TIME,
            Primitive::Lreal => TypeCode::LREAL,
        }
    }

    /// Look up a primitive by code, ignoring the queue flag.
    pub fn from_code(code: TypeCode) -> Option<Self> {
        let code = code.without_queue();
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Case-insensitive lookup by canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Canonical upper-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "BOOL",
            Primitive::Byte => "BYTE",
            Primitive::Sint => "SINT",
            Primitive::Char => "CHAR",
            Primitive::Word => "WORD",
            Primitive::Int => "INT",
            Primitive::Uint => "UINT",
            Primitive::Dword => "DWORD",
            Primitive::Dint => "DINT",
            Primitive::Udint => "UDINT",
            Primitive::Real => "REAL",
            Primitive::Lword => "LWORD",
            Primitive::Lint => "LINT",
            Primitive::Ulint => "ULINT",
            Primitive::Time => "TIME",
            Primitive::Lreal => "LREAL",
        }
    }

    /// Width in bits, decoded from the code's exponent nibble.
    pub const fn bits(self) -> u64 {
        1 << (self.code().raw() & WIDTH_MASK)
    }

    /// Width in whole bytes; zero for `Bool`, which is sub-byte.
    pub const fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_exponent_nibble() {
        assert_eq!(Primitive::Bool.bits(), 1);
        assert_eq!(Primitive::Byte.bits(), 8);
        assert_eq!(Primitive::Char.bits(), 8);
        assert_eq!(Primitive::Int.bits(), 16);
        assert_eq!(Primitive::Real.bits(), 32);
        assert_eq!(Primitive::Time.bits(), 64);
        assert_eq!(Primitive::Lreal.bytes(), 8);
        assert_eq!(Primitive::Bool.bytes(), 0);
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<u32> = Primitive::ALL.iter().map(|p| p.code().raw()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), Primitive::ALL.len());
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        assert_eq!(Primitive::from_name("dint"), Some(Primitive::Dint));
        assert_eq!(Primitive::from_name("LReal"), Some(Primitive::Lreal));
        assert_eq!(Primitive::from_name("FLOAT"), None);
    }

    #[test]
    fn queue_flag_is_transparent_to_primitive_lookup() {
        let q = TypeCode::INT.with_queue();
        assert!(q.is_queue());
        assert_eq!(q.primitive(), Some(Primitive::Int));
        assert_eq!(q.without_queue(), TypeCode::INT);
    }

    #[test]
    fn compound_codes() {
        let c = TypeCode::compound(3);
        assert!(c.is_compound());
        assert_eq!(c.compound_index(), Some(3));
        assert_eq!(c.primitive(), None);
        assert_eq!(c.with_queue().compound_index(), Some(3));
        assert_eq!(TypeCode::DINT.compound_index(), None);
    }

    #[test]
    fn unknown_codes_have_no_primitive() {
        assert_eq!(TypeCode::from_raw(0x0007).primitive(), None);
        assert_eq!(TypeCode::from_raw(0x0055).primitive(), None);
    }

    #[test]
    fn display() {
        assert_eq!(TypeCode::UDINT.to_string(), "UDINT");
        assert_eq!(TypeCode::compound(2).to_string(), "CDT#2");
        assert_eq!(TypeCode::BOOL.with_queue().to_string(), "BOOL[queue]");
    }

    #[test]
    fn align_up_rounds_to_multiples() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(135, 16), 144);
        assert_eq!(align_up(144, 16), 144);
        assert_eq!(align_up(7, 1), 7);
    }
}
