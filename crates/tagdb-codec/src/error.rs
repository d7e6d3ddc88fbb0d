use tagdb_types::TypeError;
use thiserror::Error;

/// Errors produced while converting tag values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The caller's buffer does not match the size the handle requires.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
