use thiserror::Error;

/// Errors produced by type, name, and handle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// A tag, type, or member name breaks the identifier rules.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The type code is neither a primitive nor a registered compound type.
    #[error("unknown type code {0:#010x}")]
    UnknownType(u32),

    /// No primitive or compound type carries this name.
    #[error("unknown type name: {0}")]
    UnknownTypeName(String),

    /// A different compound type is already registered under this name.
    #[error("duplicate type name: {0}")]
    DuplicateType(String),

    /// Two members of one compound type share a name.
    #[error("duplicate member {member} in {compound}")]
    DuplicateMember { compound: String, member: String },

    /// A compound type definition string could not be parsed.
    #[error("invalid definition {definition:?}: {reason}")]
    InvalidDefinition { definition: String, reason: String },

    /// The laid-out compound type would not fit a handle's byte size.
    #[error("compound type {0} is too large")]
    TypeTooLarge(String),

    /// Element counts must be at least one.
    #[error("count must be at least 1")]
    ZeroCount,

    /// A sub-range does not fit inside the handle it was cut from.
    #[error("range {first}+{count} exceeds element count {limit}")]
    RangeOutOfBounds { first: u32, count: u32, limit: u32 },

    /// Wire encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
