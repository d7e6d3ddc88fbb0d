//! Conversion between native tag values and the packed store representation.
//!
//! The store keeps multi-byte values in one configured [`ByteOrder`] and packs
//! booleans one bit per element. This crate converts in both directions,
//! walking compound types member by member, and repacks boolean ranges that
//! start inside a byte. Storage itself is reached through [`RawAccess`].

pub mod access;
pub mod bits;
pub mod convert;
pub mod error;
pub mod order;

pub use access::{read_typed, value_len, write_typed, RawAccess};
pub use bits::{bit_mask, copy_bits};
pub use convert::convert;
pub use error::{CodecError, CodecResult};
pub use order::ByteOrder;
