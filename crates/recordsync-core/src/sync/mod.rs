//! Reconciliation engine.
//!
//! A [`Runner`] cycle for one [`SyncMapping`] runs the [`Initializer`]
//! (create missing counterparts) and then the [`Synchronizer`] (propagate the
//! newer side of each linked pair), sharing a per-cycle [`TimestampCache`].

pub mod binding;
pub mod cache;
pub mod initializer;
pub mod record_types;
pub mod runner;
pub mod sink;
pub mod strategy;
pub mod synchronizer;

pub use binding::{RecordBinding, SyncMapping};
pub use cache::TimestampCache;
pub use initializer::Initializer;
pub use record_types::{InstanceStream, LocalRecordType, RecordType, RemoteRecordType, ScanWindow};
pub use runner::{
    Cycle, CycleReport, Runner, RunnerConfig, DEFAULT_SCAN_OVERLAP_MS, MAX_SLACK_MS,
};
pub use sink::{CollectingErrorSink, ErrorSink, SinkError, TracingErrorSink};
pub use strategy::{AlwaysStrategy, ExcludeStrategy, PassiveStrategy, Strategy, StrategyConfig};
pub use synchronizer::{decide, Decision, Synchronizer};
