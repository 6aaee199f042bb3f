//! Store contracts consumed by the record type adapters.
//!
//! Each physical store implements one of these traits and translates its
//! native failures into `LocalStoreError` or `RemoteCallError`. Recency
//! queries use keyset pagination over `(modified_at, id)` so a scan can resume
//! from the last record it observed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recordsync_types::{Attributes, LocalStoreError, RemoteCallError};

pub type LocalResult<T> = Result<T, LocalStoreError>;
pub type RemoteResult<T> = Result<T, RemoteCallError>;

/// Position of a recency scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCursor<I> {
    /// First page: records modified at or after `since` (everything when `None`).
    Start(Option<DateTime<Utc>>),
    /// Next page: records strictly after `(timestamp, id)`.
    After { timestamp: DateTime<Utc>, id: I },
}

/// One row of a local table, including the synchronization bookkeeping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    pub id: i64,
    pub attributes: Attributes,
    pub remote_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub synchronized_at: Option<DateTime<Utc>>,
}

/// Link written together with a record created from a remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLink {
    pub remote_id: String,
    pub synchronized_at: DateTime<Utc>,
}

/// One remote object as returned by the remote system.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: String,
    pub fields: Attributes,
    pub last_modified: DateTime<Utc>,
}

/// Local relational store holding one record type.
///
/// Writes made on behalf of synchronization stamp both `updated_at` and
/// `synchronized_at` with the same value so the engine does not mistake its
/// own write for a local edit.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn find(&self, id: i64) -> LocalResult<Option<LocalRecord>>;

    async fn find_linked(&self, remote_id: &str) -> LocalResult<Option<LocalRecord>>;

    /// Insert a record. Without a link, `updated_at` is the store's clock and
    /// the record is unsynchronized.
    async fn create(
        &self,
        attributes: &Attributes,
        link: Option<SyncLink>,
    ) -> LocalResult<LocalRecord>;

    /// Overwrite the given attributes and stamp `updated_at = synchronized_at`.
    async fn update(
        &self,
        id: i64,
        attributes: &Attributes,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord>;

    /// Store the remote link and advance `synchronized_at`.
    async fn link(
        &self,
        id: i64,
        remote_id: &str,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord>;

    /// Advance `synchronized_at` only.
    async fn mark_synchronized(
        &self,
        id: i64,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord>;

    /// Records with `updated_at < until` past `cursor`, ascending by
    /// `(updated_at, id)`, at most `limit` of them.
    async fn query_recent(
        &self,
        cursor: &ScanCursor<i64>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> LocalResult<Vec<LocalRecord>>;
}

/// Remote system holding one object type.
///
/// `fields` lists the remote field names to load; the store always adds its
/// own identifier and modification stamp.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn find(&self, id: &str, fields: &[String]) -> RemoteResult<Option<RemoteRecord>>;

    async fn create(&self, fields: &Attributes) -> RemoteResult<RemoteRecord>;

    /// Apply the changes and return the record as stored afterwards.
    async fn update(&self, id: &str, fields: &Attributes) -> RemoteResult<RemoteRecord>;

    async fn query_recent(
        &self,
        fields: &[String],
        cursor: &ScanCursor<String>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> RemoteResult<Vec<RemoteRecord>>;
}
