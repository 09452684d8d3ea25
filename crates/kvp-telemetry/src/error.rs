//! Error types for telemetry operations.

use kvp_pool::PoolError;
use thiserror::Error;

/// Errors from the registry, sinks, and their collaborators.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Pool file could not be opened, encoded into, or written.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// A sink is already bound to this name.
    #[error("sink already registered under '{0}'")]
    DuplicateRegistration(String),

    /// No sink is bound to this name.
    #[error("no sink registered under '{0}'")]
    NotRegistered(String),

    /// VM identifier could not be determined.
    #[error("VM identity unavailable: {0}")]
    Identity(String),

    /// Event metadata alone leaves no room for the message.
    #[error("event metadata is {overhead} bytes, over the {max}-byte value limit")]
    EventTooLarge { overhead: usize, max: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
