//! Storage for the tag database.
//!
//! - [`BitStore`] is the growable, bit-addressable memory behind every tag.
//! - [`SymbolTable`] holds tag descriptors sorted by start address.
//! - [`Allocator`] places new tags first-fit with type-specific alignment.

pub mod alloc;
pub mod bitstore;
pub mod config;
pub mod error;
pub mod symbols;

pub use alloc::{find_slot, Allocator};
pub use bitstore::{BitStore, MAX_WORDS, WORD_BITS, WORD_BYTES};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use symbols::{MapEntry, Override, SymbolTable, TagDescriptor, TagSpec};
