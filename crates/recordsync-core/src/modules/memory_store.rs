//! In-memory implementations of both store contracts.
//!
//! Used by tests and dry runs. Both stores keep a monotonic millisecond clock
//! so two writes never share a timestamp, count every mutating call, and can
//! be told to fail writes whose attributes carry a given value.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use recordsync_types::{Attributes, LocalStoreError, RemoteCallError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::repository::{
    LocalRecord, LocalResult, LocalStore, RemoteRecord, RemoteResult, RemoteStore, ScanCursor,
    SyncLink,
};

#[derive(Debug, Default)]
struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    /// Millisecond precision, like the stamps real stores persist.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = Utc.timestamp_millis_opt(now.timestamp_millis()).single().unwrap_or(now);
        let next = match self.last {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(next);
        next
    }
}

/// Attribute value that makes a write fail.
#[derive(Debug, Clone)]
struct FailureRule {
    field: String,
    value: serde_json::Value,
}

impl FailureRule {
    fn matches(&self, attributes: &Attributes) -> bool {
        attributes.get(&self.field) == Some(&self.value)
    }
}

fn matches_any(rules: &[FailureRule], attributes: &Attributes) -> bool {
    rules.iter().any(|rule| rule.matches(attributes))
}

fn in_window<I: Ord>(
    timestamp: DateTime<Utc>,
    id: &I,
    cursor: &ScanCursor<I>,
    until: DateTime<Utc>,
) -> bool {
    if timestamp >= until {
        return false;
    }
    match cursor {
        ScanCursor::Start(None) => true,
        ScanCursor::Start(Some(since)) => timestamp >= *since,
        ScanCursor::After { timestamp: after, id: after_id } => {
            timestamp > *after || (timestamp == *after && id > after_id)
        },
    }
}

#[derive(Debug, Default)]
struct LocalState {
    next_id: i64,
    records: BTreeMap<i64, LocalRecord>,
    clock: Clock,
    failures: Vec<FailureRule>,
}

/// Local store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    state: Mutex<LocalState>,
    writes: AtomicUsize,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record with explicit bookkeeping, bypassing the write counter.
    pub fn insert(
        &self,
        attributes: Attributes,
        remote_id: Option<&str>,
        updated_at: DateTime<Utc>,
        synchronized_at: Option<DateTime<Utc>>,
    ) -> LocalRecord {
        let mut state = self.state.lock();
        state.next_id += 1;
        let record = LocalRecord {
            id: state.next_id,
            attributes,
            remote_id: remote_id.map(str::to_string),
            updated_at,
            synchronized_at,
        };
        state.records.insert(record.id, record.clone());
        record
    }

    /// Simulate an application edit: merge attributes and bump `updated_at`.
    pub fn edit(&self, id: i64, attributes: Attributes) -> Option<LocalRecord> {
        let mut state = self.state.lock();
        let now = state.clock.tick();
        let record = state.records.get_mut(&id)?;
        record.attributes.extend(attributes);
        record.updated_at = now;
        Some(record.clone())
    }

    /// Make every create/update carrying `field == value` fail.
    pub fn fail_writes_matching(&self, field: &str, value: serde_json::Value) {
        self.state.lock().failures.push(FailureRule { field: field.to_string(), value });
    }

    pub fn get(&self, id: i64) -> Option<LocalRecord> {
        self.state.lock().records.get(&id).cloned()
    }

    pub fn records(&self) -> Vec<LocalRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mutating calls made through the store contract.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn modify<F>(&self, id: i64, apply: F) -> LocalResult<LocalRecord>
    where
        F: FnOnce(&mut LocalRecord, &[FailureRule]) -> LocalResult<()>,
    {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let LocalState { records, failures, .. } = &mut *state;
        let record =
            records.get_mut(&id).ok_or(LocalStoreError::NotFound { id: id.to_string() })?;
        apply(record, failures)?;
        Ok(record.clone())
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn find(&self, id: i64) -> LocalResult<Option<LocalRecord>> {
        Ok(self.get(id))
    }

    async fn find_linked(&self, remote_id: &str) -> LocalResult<Option<LocalRecord>> {
        Ok(self
            .state
            .lock()
            .records
            .values()
            .find(|r| r.remote_id.as_deref() == Some(remote_id))
            .cloned())
    }

    async fn create(
        &self,
        attributes: &Attributes,
        link: Option<SyncLink>,
    ) -> LocalResult<LocalRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if matches_any(&state.failures, attributes) {
            return Err(LocalStoreError::Database { message: "injected create failure".into() });
        }
        if let Some(link) = &link {
            if state.records.values().any(|r| r.remote_id.as_deref() == Some(&link.remote_id)) {
                return Err(LocalStoreError::Conflict {
                    message: format!("remote_id {} already linked", link.remote_id),
                });
            }
        }

        let (updated_at, remote_id, synchronized_at) = match link {
            Some(link) => (link.synchronized_at, Some(link.remote_id), Some(link.synchronized_at)),
            None => (state.clock.tick(), None, None),
        };
        state.next_id += 1;
        let record = LocalRecord {
            id: state.next_id,
            attributes: attributes.clone(),
            remote_id,
            updated_at,
            synchronized_at,
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        attributes: &Attributes,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord> {
        self.modify(id, |record, failures| {
            if matches_any(failures, attributes) {
                return Err(LocalStoreError::Database { message: "injected update failure".into() });
            }
            record.attributes.extend(attributes.clone());
            record.updated_at = synchronized_at;
            record.synchronized_at = Some(synchronized_at);
            Ok(())
        })
    }

    async fn link(
        &self,
        id: i64,
        remote_id: &str,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord> {
        self.modify(id, |record, _| {
            record.remote_id = Some(remote_id.to_string());
            record.synchronized_at = Some(synchronized_at);
            Ok(())
        })
    }

    async fn mark_synchronized(
        &self,
        id: i64,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord> {
        self.modify(id, |record, _| {
            record.synchronized_at = Some(synchronized_at);
            Ok(())
        })
    }

    async fn query_recent(
        &self,
        cursor: &ScanCursor<i64>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> LocalResult<Vec<LocalRecord>> {
        let state = self.state.lock();
        let mut page: Vec<LocalRecord> = state
            .records
            .values()
            .filter(|r| in_window(r.updated_at, &r.id, cursor, until))
            .cloned()
            .collect();
        page.sort_by(|a, b| (a.updated_at, a.id).cmp(&(b.updated_at, b.id)));
        page.truncate(limit);
        Ok(page)
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    next_id: u64,
    records: BTreeMap<String, RemoteRecord>,
    clock: Clock,
    failures: Vec<FailureRule>,
}

impl RemoteState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("a0M{:012}", self.next_id)
    }
}

/// Remote store backed by a map; ids sort in creation order.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    state: Mutex<RemoteState>,
    writes: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record with an explicit modification stamp.
    pub fn insert(&self, fields: Attributes, last_modified: DateTime<Utc>) -> RemoteRecord {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let record = RemoteRecord { id, fields, last_modified };
        state.records.insert(record.id.clone(), record.clone());
        record
    }

    /// Simulate an edit made directly in the remote system.
    pub fn edit(&self, id: &str, fields: Attributes) -> Option<RemoteRecord> {
        let mut state = self.state.lock();
        let now = state.clock.tick();
        let record = state.records.get_mut(id)?;
        record.fields.extend(fields);
        record.last_modified = now;
        Some(record.clone())
    }

    pub fn fail_writes_matching(&self, field: &str, value: serde_json::Value) {
        self.state.lock().failures.push(FailureRule { field: field.to_string(), value });
    }

    pub fn get(&self, id: &str) -> Option<RemoteRecord> {
        self.state.lock().records.get(id).cloned()
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn find(&self, id: &str, _fields: &[String]) -> RemoteResult<Option<RemoteRecord>> {
        Ok(self.get(id))
    }

    async fn create(&self, fields: &Attributes) -> RemoteResult<RemoteRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if matches_any(&state.failures, fields) {
            return Err(RemoteCallError::Status {
                status: 400,
                message: "injected create failure".into(),
            });
        }
        let id = state.allocate_id();
        let last_modified = state.clock.tick();
        let record = RemoteRecord { id, fields: fields.clone(), last_modified };
        state.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, fields: &Attributes) -> RemoteResult<RemoteRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if matches_any(&state.failures, fields) {
            return Err(RemoteCallError::Status {
                status: 400,
                message: "injected update failure".into(),
            });
        }
        let now = state.clock.tick();
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| RemoteCallError::NotFound { id: id.to_string() })?;
        record.fields.extend(fields.clone());
        record.last_modified = now;
        Ok(record.clone())
    }

    async fn query_recent(
        &self,
        _fields: &[String],
        cursor: &ScanCursor<String>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let state = self.state.lock();
        let mut page: Vec<RemoteRecord> = state
            .records
            .values()
            .filter(|r| in_window(r.last_modified, &r.id, cursor, until))
            .cloned()
            .collect();
        page.sort_by(|a, b| (a.last_modified, &a.id).cmp(&(b.last_modified, &b.id)));
        page.truncate(limit);
        Ok(page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    fn attrs(name: &str) -> Attributes {
        Attributes::from([("name".to_string(), json!(name))])
    }

    #[tokio::test]
    async fn test_local_query_recent_pages_by_keyset() {
        let store = MemoryLocalStore::new();
        let a = store.insert(attrs("a"), None, ts(1_000), None);
        let b = store.insert(attrs("b"), None, ts(1_000), None);
        let c = store.insert(attrs("c"), None, ts(2_000), None);
        store.insert(attrs("late"), None, ts(9_000), None);

        let first = store.query_recent(&ScanCursor::Start(None), ts(5_000), 2).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id, b.id]);

        let cursor = ScanCursor::After { timestamp: ts(1_000), id: b.id };
        let second = store.query_recent(&cursor, ts(5_000), 2).await.unwrap();
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), vec![c.id]);
    }

    #[tokio::test]
    async fn test_local_create_with_link_stamps_both_columns() {
        let store = MemoryLocalStore::new();
        let link = SyncLink { remote_id: "a0M1".into(), synchronized_at: ts(4_000) };

        let record = store.create(&attrs("x"), Some(link.clone())).await.unwrap();

        assert_eq!(record.updated_at, ts(4_000));
        assert_eq!(record.synchronized_at, Some(ts(4_000)));
        assert!(matches!(
            store.create(&attrs("y"), Some(link)).await,
            Err(LocalStoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_remote_clock_is_monotonic() {
        let store = MemoryRemoteStore::new();
        let first = store.create(&attrs("a")).await.unwrap();
        let second = store.create(&attrs("b")).await.unwrap();

        assert!(second.last_modified > first.last_modified);
        assert!(second.id > first.id);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_only_hits_matching_writes() {
        let store = MemoryRemoteStore::new();
        store.fail_writes_matching("name", json!("broken"));

        assert!(store.create(&attrs("broken")).await.is_err());
        assert!(store.create(&attrs("fine")).await.is_ok());
        assert_eq!(store.len(), 1);
    }
}
