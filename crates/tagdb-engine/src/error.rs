use std::io;

use tagdb_codec::CodecError;
use tagdb_store::StoreError;
use tagdb_types::{TagIndex, TypeCode, TypeError};

use crate::atomic::AtomicOp;

/// Broad class of an [`EngineError`], for callers that map failures onto
/// status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad name, type, count, or request. Nothing was changed.
    Validation,
    /// A handle or size exceeds a tag or the store. Nothing was changed.
    Bounds,
    /// The store could not grow.
    Allocation,
    /// A write's propagation chain exceeded the hop limit.
    PropagationOverflow,
    /// The tag or mapping does not exist.
    NotFound,
}

/// Errors produced by the tag engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// No tag has this index.
    #[error("tag {0} not found")]
    TagNotFound(TagIndex),

    /// No tag has this name.
    #[error("tag {0:?} not found")]
    TagNameNotFound(String),

    /// The tag has no mapping with this id.
    #[error("mapping {id} not found on tag {index}")]
    MappingNotFound { index: TagIndex, id: u32 },

    /// The handle reaches outside the tag it names.
    #[error("handle at byte {byte}+{size} is outside tag {name}")]
    HandleOutOfBounds { name: String, byte: u64, size: u64 },

    /// Clients may not write this tag.
    #[error("tag {0} is read-only")]
    ReadOnly(String),

    /// The operation is not allowed on the reserved status tag.
    #[error("tag {0} is reserved")]
    Reserved(String),

    /// The mapping source does not fit in the destination.
    #[error(
        "mapping source of {source_size} bytes does not fit destination of \
         {destination_size} bytes"
    )]
    MappingSize {
        source_size: u32,
        destination_size: u32,
    },

    /// The tag has no override installed.
    #[error("tag {0} has no override")]
    NoOverride(String),

    /// The atomic operation cannot be applied to this handle.
    #[error("atomic {op:?} on {type_code}: {reason}")]
    IllegalAtomic {
        op: AtomicOp,
        type_code: TypeCode,
        reason: &'static str,
    },

    /// The hop limit was exceeded while propagating a write. The write that
    /// started the chain was applied.
    #[error("propagation from tag {origin} exceeded {hops} hops")]
    PropagationOverflow { origin: String, hops: u32 },

    /// Configuration could not be read.
    #[error("config io error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid config: {0}")]
    Config(String),
}

impl EngineError {
    /// Which broad class of failure this is.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Type(TypeError::RangeOutOfBounds { .. }) => ErrorCategory::Bounds,
            EngineError::Type(_) => ErrorCategory::Validation,
            EngineError::Store(StoreError::OutOfBounds { .. }) => ErrorCategory::Bounds,
            EngineError::Store(StoreError::Allocation { .. }) => ErrorCategory::Allocation,
            EngineError::Store(_) => ErrorCategory::Validation,
            EngineError::Codec(CodecError::BufferSize { .. }) => ErrorCategory::Bounds,
            EngineError::Codec(_) => ErrorCategory::Validation,
            EngineError::TagNotFound(_)
            | EngineError::TagNameNotFound(_)
            | EngineError::MappingNotFound { .. }
            | EngineError::NoOverride(_) => ErrorCategory::NotFound,
            EngineError::HandleOutOfBounds { .. } | EngineError::MappingSize { .. } => {
                ErrorCategory::Bounds
            }
            EngineError::ReadOnly(_)
            | EngineError::Reserved(_)
            | EngineError::IllegalAtomic { .. }
            | EngineError::Io(_)
            | EngineError::Config(_) => ErrorCategory::Validation,
            EngineError::PropagationOverflow { .. } => ErrorCategory::PropagationOverflow,
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
