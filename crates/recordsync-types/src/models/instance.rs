//! Uniform view over one record from either store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a record in its own store.
pub type RecordId = String;

/// Field name -> value. Ordered so reports and diffs are stable.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Which system a record lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote,
}

impl Origin {
    /// The other side of the mapping.
    pub fn counterpart(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient envelope around one concrete record.
///
/// Built by a record type adapter whenever it loads or writes a record. Local
/// instances may carry a link to their remote counterpart and the watermark of
/// the last successful synchronization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    origin: Origin,
    id: RecordId,
    attributes: Attributes,
    last_update: DateTime<Utc>,
    #[serde(default)]
    remote_id: Option<RecordId>,
    #[serde(default)]
    synchronized_at: Option<DateTime<Utc>>,
}

impl Instance {
    /// Instance loaded from the local store.
    pub fn local(id: impl Into<RecordId>, attributes: Attributes, last_update: DateTime<Utc>) -> Self {
        Self {
            origin: Origin::Local,
            id: id.into(),
            attributes,
            last_update,
            remote_id: None,
            synchronized_at: None,
        }
    }

    /// Instance loaded from the remote system.
    pub fn remote(
        id: impl Into<RecordId>,
        attributes: Attributes,
        last_update: DateTime<Utc>,
    ) -> Self {
        Self {
            origin: Origin::Remote,
            id: id.into(),
            attributes,
            last_update,
            remote_id: None,
            synchronized_at: None,
        }
    }

    /// Attach the remote counterpart link (local instances only).
    pub fn with_remote_id(mut self, remote_id: Option<RecordId>) -> Self {
        self.remote_id = remote_id;
        self
    }

    /// Attach the last synchronization watermark (local instances only).
    pub fn with_synchronized_at(mut self, synchronized_at: Option<DateTime<Utc>>) -> Self {
        self.synchronized_at = synchronized_at;
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Modification timestamp as reported by the owning store.
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn synchronized_at(&self) -> Option<DateTime<Utc>> {
        self.synchronized_at
    }

    /// True once a local record has been linked to a remote counterpart.
    pub fn is_synced(&self) -> bool {
        self.origin == Origin::Local && self.remote_id.is_some()
    }

    /// Key under which the timestamp cache tracks this record.
    pub fn cache_key(&self) -> (Origin, RecordId) {
        (self.origin, self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    #[test]
    fn test_local_instance_sync_state() {
        let unlinked = Instance::local("7", Attributes::new(), ts(1_000));
        assert!(!unlinked.is_synced());

        let linked = unlinked.with_remote_id(Some("a01".into())).with_synchronized_at(Some(ts(900)));
        assert!(linked.is_synced());
        assert_eq!(linked.remote_id(), Some("a01"));
        assert_eq!(linked.synchronized_at(), Some(ts(900)));
    }

    #[test]
    fn test_remote_instance_is_never_synced() {
        let remote = Instance::remote("a01", Attributes::new(), ts(1_000))
            .with_remote_id(Some("ignored".into()));
        assert!(!remote.is_synced());
        assert_eq!(remote.origin().counterpart(), Origin::Local);
    }

    #[test]
    fn test_origin_serializes_lowercase() {
        let json = serde_json::to_string(&Origin::Remote).unwrap_or_default();
        assert_eq!(json, "\"remote\"");
    }
}
