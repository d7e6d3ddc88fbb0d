//! Foundation types for the tag database.
//!
//! Every other tagdb crate depends on `tagdb-types`. It defines how element
//! types are encoded, how a tag's bit range is addressed, and how compound
//! types are laid out.
//!
//! # Key Types
//!
//! - [`TypeCode`] is the 32-bit type encoding with compound and queue flags
//! - [`Primitive`] lists the fixed-width element types
//! - [`Handle`] addresses a bit range in the store and is the wire contract
//! - [`TagIndex`] is a stable tag identifier
//! - [`TypeRegistry`] owns compound types and their layouts

pub mod code;
pub mod compound;
pub mod error;
pub mod handle;
pub mod names;

pub use code::{align_up, Primitive, TypeCode, COMPOUND_FLAG, QUEUE_FLAG};
pub use compound::{CompoundType, Member, TypeRegistry, MAX_COMPOUND_BITS};
pub use error::{TypeError, TypeResult};
pub use handle::{span_bytes, Handle, TagIndex, HANDLE_WIRE_SIZE};
pub use names::{validate_name, MAX_NAME_LEN};
