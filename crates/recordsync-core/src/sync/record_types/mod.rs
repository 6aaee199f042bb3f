//! Record type adapters.
//!
//! An adapter binds one physical store to the shared [`Mapping`] and exposes
//! it to the engine as [`Instance`]s. The engine only talks to [`RecordType`]
//! plus the local-only link operations on [`LocalRecordType`].

mod local;
mod remote;

pub use local::LocalRecordType;
pub use remote::RemoteRecordType;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use recordsync_types::{Instance, Origin, TypedError};

/// Stream of recently changed instances; ends after the first error.
pub type InstanceStream<'a> = BoxStream<'a, Result<Instance, TypedError>>;

/// Half-open recency window `[since, until)`. No lower bound when `since` is
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
}

impl ScanWindow {
    pub fn new(since: Option<DateTime<Utc>>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }
}

#[async_trait]
pub trait RecordType: Send + Sync {
    fn origin(&self) -> Origin;

    /// Human-readable store name for logs.
    fn describe(&self) -> String;

    async fn find(&self, id: &str) -> Result<Option<Instance>, TypedError>;

    /// Persist a new record translated from `source`.
    async fn create(&self, source: &Instance) -> Result<Instance, TypedError>;

    /// Overwrite `target` with the translated attributes of `source`.
    async fn update(&self, target: &Instance, source: &Instance) -> Result<Instance, TypedError>;

    /// Records modified inside `window`, ascending by modification time then id.
    ///
    /// Pages are fetched lazily, so dropping the stream stops the scan.
    fn recently_changed(&self, window: ScanWindow) -> InstanceStream<'_>;
}
