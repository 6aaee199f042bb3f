//! Field value conversion errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value could not be translated by the converter registered for its field.
///
/// Surfaced instead of dropping the field: a half-translated record must not be
/// written to either store.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("Cannot convert field {field} to {target}: {message}")]
pub struct ConversionError {
    /// Field name on the source side
    pub field: String,
    /// Converter target type (e.g. "integer")
    pub target: String,
    /// What went wrong
    pub message: String,
}

impl ConversionError {
    pub fn new(
        field: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { field: field.into(), target: target.into(), message: message.into() }
    }
}
