//! # recordsync Core
//!
//! Reconciliation engine keeping a local SQLite store and a remote CRM in sync.
//!
//! ## Architecture
//!
//! ```text
//! recordsync-core/src/
//! ├── modules/        # store contracts, SQLite + in-memory stores, config, watermarks
//! ├── remote/         # REST remote store and SOQL builder
//! ├── sync/           # record types, cache, initializer, synchronizer, runner
//! ├── engine.rs       # config -> mappings wiring
//! └── utils/          # HTTP client
//! ```
//!
//! A cycle per mapping: scan both sides for recent changes, create missing
//! counterparts, then push the newer side of each linked pair across.

#![allow(
    clippy::significant_drop_tightening,
    reason = "parking_lot guards in store code are scoped to one statement block"
)]
#![allow(
    clippy::redundant_else,
    reason = "Explicit else blocks improve readability in complex control flow"
)]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Attribute maps hold serde_json values, which are not Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::needless_collect,
        clippy::assertions_on_result_states
    )
)]

pub mod engine;
pub mod error;
pub mod modules;
pub mod remote;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use engine::Engine;
pub use error::{AppError, AppResult};
pub use modules::config::{load_config, SyncConfig};
pub use sync::{CycleReport, RecordBinding, Runner, RunnerConfig, SyncMapping};
