//! Typed error definitions for recordsync.
//!
//! This module provides a structured error hierarchy with specific error types
//! for each failure domain. All errors are designed to be:
//!
//! - **Serializable** for error reports via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants
//! - **Composable** via thiserror derive macros
//!
//! Only [`ConfigError`] is fatal, and only before a cycle starts. Store and
//! conversion failures are per-record: the engine wraps them into a
//! [`SynchronizationError`] and keeps going.

mod config;
mod conversion;
mod store;
mod sync;

pub use config::ConfigError;
pub use conversion::ConversionError;
pub use store::{LocalStoreError, RemoteCallError};
pub use sync::SynchronizationError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
///
/// Adapters translate their native failures into one of these kinds so the
/// reconciliation logic branches on kind, not on store-specific error types.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Wraps a local persistence failure
    #[error("Local store error: {0}")]
    LocalStore(#[from] LocalStoreError),

    /// Wraps a remote system call failure
    #[error("Remote call error: {0}")]
    RemoteCall(#[from] RemoteCallError),

    /// Wraps a field value conversion failure
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

impl TypedError {
    /// Whether the failure happened on the remote side.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteCall(_))
    }
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = TypedError::LocalStore(LocalStoreError::NotFound { id: "42".to_string() });

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("LocalStore"));
        assert!(json.contains("42"));

        let deserialized: TypedError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let err = RemoteCallError::RateLimited { retry_after_secs: Some(60) };

        let msg = format!("{}", err);
        assert!(msg.contains("60"));
    }

    #[test]
    fn test_is_remote() {
        let remote: TypedError = RemoteCallError::Network { message: "reset".into() }.into();
        let local: TypedError = LocalStoreError::Database { message: "locked".into() }.into();

        assert!(remote.is_remote());
        assert!(!local.is_remote());
    }
}
