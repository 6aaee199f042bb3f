//! Store-level errors for the two sides of a mapping.
//!
//! The split matters: retry and backoff for the remote side belong to the
//! transport, while local failures are usually constraint or locking problems.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the local relational store.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum LocalStoreError {
    /// Record with given ID not found
    #[error("Local record not found: {id}")]
    NotFound {
        /// Identifier of the missing record
        id: String,
    },

    /// A unique constraint rejected the write (e.g. remote link already taken)
    #[error("Local record conflict: {message}")]
    Conflict {
        /// Description of the violated constraint
        message: String,
    },

    /// Query or commit failed
    #[error("Local database error: {message}")]
    Database {
        /// Driver error message
        message: String,
    },

    /// A stored value could not be read back into an attribute
    #[error("Local column {column} holds an unreadable value: {message}")]
    Decode {
        /// Column name
        column: String,
        /// Description of the decode failure
        message: String,
    },
}

/// Errors raised while talking to the remote system.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RemoteCallError {
    /// Credentials rejected (401/403)
    #[error("Remote authentication failed: {message}")]
    Authentication {
        /// Body or reason returned by the remote system
        message: String,
    },

    /// Remote system throttled the request (429)
    #[error("Remote rate limit exceeded (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Seconds to wait before retrying, if the remote sent one
        retry_after_secs: Option<u64>,
    },

    /// Connection, DNS, TLS or timeout failure
    #[error("Remote network error: {message}")]
    Network {
        /// Transport error message
        message: String,
    },

    /// Record with given ID not found (404)
    #[error("Remote record not found: {id}")]
    NotFound {
        /// Identifier of the missing record
        id: String,
    },

    /// Any other non-success HTTP status
    #[error("Remote returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or error summary
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Invalid remote response: {message}")]
    InvalidResponse {
        /// Description of the decode failure
        message: String,
    },
}

impl RemoteCallError {
    /// Whether the next cycle has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Authentication { .. } | Self::NotFound { .. } | Self::InvalidResponse { .. } => {
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteCallError::RateLimited { retry_after_secs: None }.is_transient());
        assert!(RemoteCallError::Status { status: 503, message: String::new() }.is_transient());
        assert!(!RemoteCallError::Status { status: 400, message: String::new() }.is_transient());
        assert!(!RemoteCallError::Authentication { message: "expired".into() }.is_transient());
    }
}
