//! Per-record synchronization failure reports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TypedError;
use crate::models::{Instance, Origin};

/// A store or conversion failure tied to the record that caused it.
///
/// Reported through the error sink; never aborts a cycle. `instance` is `None`
/// when the failure happened while scanning rather than on a specific record.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("[{mapping}] {origin} record {}: {source}", record_id.as_deref().unwrap_or("<scan>"))]
pub struct SynchronizationError {
    /// Name of the mapping being processed
    pub mapping: String,
    /// System the offending record came from
    pub origin: Origin,
    /// Identifier of the offending record, when known
    pub record_id: Option<String>,
    /// Snapshot of the offending record, when known
    pub instance: Option<Instance>,
    /// Underlying failure
    #[source]
    pub source: TypedError,
}

impl SynchronizationError {
    /// Failure while processing a specific instance.
    pub fn for_instance(
        mapping: impl Into<String>,
        instance: &Instance,
        source: impl Into<TypedError>,
    ) -> Self {
        Self {
            mapping: mapping.into(),
            origin: instance.origin(),
            record_id: Some(instance.id().to_string()),
            instance: Some(instance.clone()),
            source: source.into(),
        }
    }

    /// Failure while scanning one side for recent changes.
    pub fn for_scan(mapping: impl Into<String>, origin: Origin, source: impl Into<TypedError>) -> Self {
        Self {
            mapping: mapping.into(),
            origin,
            record_id: None,
            instance: None,
            source: source.into(),
        }
    }
}
