use tagdb_types::{TypeCode, TypeError};
use thiserror::Error;

/// Errors produced by the backing store, symbol table, and allocator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A byte range falls outside the store.
    #[error("range {offset}+{len} exceeds store capacity of {capacity} bytes")]
    OutOfBounds { offset: u64, len: u64, capacity: u64 },

    /// Data and mask of a masked write differ in length.
    #[error("mask length {mask} does not match data length {data}")]
    LengthMismatch { data: usize, mask: usize },

    /// The store could not grow to the requested size.
    #[error("cannot grow store to {requested_words} words: {reason}")]
    Allocation { requested_words: u64, reason: String },

    /// A tag would overlap an existing tag's bit range.
    #[error("tag {name} overlaps {other}")]
    Overlap { name: String, other: String },

    /// A tag with this name already exists.
    #[error("duplicate tag name: {0}")]
    DuplicateName(String),

    /// Queue variants have no storage layout.
    #[error("queue types are not supported: {0}")]
    QueueUnsupported(TypeCode),

    /// Store configuration is inconsistent.
    #[error("invalid store config: {0}")]
    InvalidConfig(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
