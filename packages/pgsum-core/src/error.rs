//! Error types for pgsum-core

use thiserror::Error;

/// Errors raised by the pure hashing/codec layer.
///
/// Everything here is a programming-contract violation (a malformed column
/// count, an unknown algorithm tag read back from storage) rather than an
/// I/O or database failure — those live in `pgsum-postgres::Error`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("chunk_width must be >= 1")]
    InvalidChunkWidth,

    #[error("unknown hash algorithm tag: {0}")]
    UnknownHashAlgorithm(String),

    #[error("unknown chunk derivation tag: {0}")]
    UnknownChunkDerivation(String),
}

/// Result type alias for pgsum-core.
pub type Result<T> = std::result::Result<T, Error>;
