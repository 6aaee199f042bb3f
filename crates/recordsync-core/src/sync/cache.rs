//! Per-cycle memo of the timestamps the engine has already acted on.

use chrono::{DateTime, Utc};
use recordsync_types::{Instance, Origin, RecordId};
use std::collections::HashMap;

/// Map from `(origin, id)` to the latest modification time already handled
/// in this cycle. Entries only move forward.
#[derive(Debug, Default)]
pub struct TimestampCache {
    entries: HashMap<(Origin, RecordId), DateTime<Utc>>,
}

impl TimestampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `instance`'s modification time. Re-caching an older or equal
    /// timestamp is a no-op.
    pub fn cache_timestamp(&mut self, instance: &Instance) {
        let at = instance.last_update();
        self.entries
            .entry(instance.cache_key())
            .and_modify(|cached| *cached = (*cached).max(at))
            .or_insert(at);
    }

    /// False once a timestamp at or after `instance`'s modification time has
    /// been cached.
    pub fn changed(&self, instance: &Instance) -> bool {
        !matches!(
            self.entries.get(&(instance.origin(), instance.id().to_string())),
            Some(cached) if *cached >= instance.last_update()
        )
    }

    pub fn get(&self, origin: Origin, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(&(origin, id.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    fn remote(id: &str, at: i64) -> Instance {
        Instance::remote(id, Default::default(), ts(at))
    }

    #[test]
    fn test_unknown_instance_is_changed() {
        let cache = TimestampCache::new();
        assert!(cache.changed(&remote("a", 1_000)));
    }

    #[test]
    fn test_cached_instance_is_unchanged_until_newer() {
        let mut cache = TimestampCache::new();
        cache.cache_timestamp(&remote("a", 1_000));

        assert!(!cache.changed(&remote("a", 1_000)));
        assert!(!cache.changed(&remote("a", 900)));
        assert!(cache.changed(&remote("a", 1_001)));
    }

    #[test]
    fn test_cache_never_moves_backwards() {
        let mut cache = TimestampCache::new();
        cache.cache_timestamp(&remote("a", 2_000));
        cache.cache_timestamp(&remote("a", 1_000));
        cache.cache_timestamp(&remote("a", 2_000));

        assert_eq!(cache.get(Origin::Remote, "a"), Some(ts(2_000)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_origins_are_tracked_separately() {
        let mut cache = TimestampCache::new();
        cache.cache_timestamp(&Instance::local("1", Default::default(), ts(1_000)));

        assert!(cache.changed(&remote("1", 1_000)));
        assert!(cache.get(Origin::Local, "1").is_some());
    }
}
