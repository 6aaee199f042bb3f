//! Unified error types for recordsync Core.
//!
//! Per-record failures never surface here: they are wrapped into a
//! `SynchronizationError` and handed to the error sink. `AppError` covers what
//! can stop the process or keep a cycle from starting.

use recordsync_types::{ConfigError, TypedError};
use serde::Serialize;
use thiserror::Error;

/// Main error type for process-level recordsync operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Database could not be opened or prepared (SQLite).
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client could not be built.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A store failed outside of per-record processing.
    #[error("Store error: {0}")]
    Store(#[from] TypedError),

    /// Watermark storage is unreadable or could not be written.
    #[error("Watermark error: {0}")]
    Watermark(String),

    /// No mapping with the requested name.
    #[error("Unknown mapping: {0}")]
    UnknownMapping(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for recordsync operations.
pub type AppResult<T> = Result<T, AppError>;
