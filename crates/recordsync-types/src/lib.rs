//! # recordsync Types
//!
//! Core types, field mappings, and error definitions for recordsync.
//!
//! This crate provides the shared vocabulary of the reconciliation engine:
//!
//! - **`error`** - Typed error hierarchy for configuration, stores, and conversions
//! - **`models`** - Domain models (Instance, Mapping, converters)
//!
//! ## Architecture Role
//!
//! `recordsync-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!           recordsync-types (this crate)
//!                    │
//!                    ▼
//!             recordsync-core
//!                    │
//!                    ▼
//!            recordsync-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for config files and error reports
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{
    ConfigError, ConversionError, LocalStoreError, RemoteCallError, Result,
    SynchronizationError, TypedError,
};

// Re-export core model types
pub use models::{
    parse_timestamp, to_timestamp, Attributes, Converter, Direction, FieldMapping, Instance,
    Mapping, Origin, RecordId,
};
