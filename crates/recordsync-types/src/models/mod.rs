//! Core domain models for recordsync.
//!
//! This module contains the data structures shared by the engine and the
//! store adapters.

mod instance;
mod mapping;

// Re-export all models
pub use instance::{Attributes, Instance, Origin, RecordId};
pub use mapping::{
    parse_timestamp, to_timestamp, Converter, Direction, FieldMapping, Mapping,
};
