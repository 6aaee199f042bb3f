//! Store contracts and implementations, configuration, and watermark persistence.

pub mod config;
pub mod memory_store;
pub mod repository;
pub mod sqlite_store;
pub mod watermark;
