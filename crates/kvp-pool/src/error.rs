//! Error types for pool file operations.

use std::path::PathBuf;
use thiserror::Error;

/// A key or value that cannot be represented in a slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Key exceeds the fixed key width. Keys are never truncated.
    #[error("key is {len} bytes, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },

    /// Empty keys would be indistinguishable from empty slots.
    #[error("key must not be empty")]
    EmptyKey,

    /// Character outside 7-bit ASCII (or an embedded NUL).
    #[error("unsupported character {ch:?} in {field} at byte {offset}")]
    UnsupportedCharacter {
        field: &'static str,
        ch: char,
        offset: usize,
    },

    /// Raw byte outside the charset while decoding.
    #[error("unsupported byte 0x{byte:02x} in {field} at byte {offset}")]
    UnsupportedByte {
        field: &'static str,
        byte: u8,
        offset: usize,
    },

    /// Input buffer is not exactly one slot wide.
    #[error("slot is {actual} bytes, expected {expected}")]
    SlotLength { expected: usize, actual: usize },
}

/// Errors that can occur during pool file operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Record could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Pool file could not be opened for read/write.
    #[error("pool file unavailable at {}: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an open pool file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
