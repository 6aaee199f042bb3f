//! Steady-state pass: reconcile linked pairs, newest side wins.

use chrono::Duration;
use futures::StreamExt;
use recordsync_types::{Instance, Origin, SynchronizationError, TypedError};
use tracing::{debug, warn};

use super::binding::SyncMapping;
use super::record_types::RecordType;
use super::runner::Cycle;

/// What to do with a linked pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Copy remote attributes onto the local record.
    UpdateLocal,
    /// Copy local attributes onto the remote record.
    UpdateRemote,
    UpToDate,
}

/// Compare both modification times against the local watermark.
///
/// A side changed when its modification time is past `watermark + tolerance`;
/// a local record with no watermark has never been reconciled, so the remote
/// side counts as changed. When both changed the strictly newer side wins and
/// a tie leaves the pair alone. A horizon past the representable range means
/// neither side changed.
pub fn decide(local: &Instance, remote: &Instance, tolerance: Duration) -> Decision {
    let (remote_changed, local_changed) = match local.synchronized_at() {
        None => (true, false),
        Some(watermark) => match watermark.checked_add_signed(tolerance) {
            Some(horizon) => (remote.last_update() > horizon, local.last_update() > horizon),
            None => (false, false),
        },
    };

    if remote_changed && (!local_changed || remote.last_update() > local.last_update()) {
        Decision::UpdateLocal
    } else if local_changed && (!remote_changed || local.last_update() > remote.last_update()) {
        Decision::UpdateRemote
    } else {
        Decision::UpToDate
    }
}

pub struct Synchronizer<'m> {
    mapping: &'m SyncMapping,
}

impl<'m> Synchronizer<'m> {
    pub fn new(mapping: &'m SyncMapping) -> Self {
        Self { mapping }
    }

    pub async fn run(&self, cycle: &mut Cycle<'_>) {
        self.sync_from_remote(cycle).await;
        self.sync_from_local(cycle).await;
    }

    async fn sync_from_remote(&self, cycle: &mut Cycle<'_>) {
        let mut scan = self.mapping.remote().recently_changed(cycle.window());
        while let Some(item) = scan.next().await {
            let remote = match item {
                Ok(instance) => instance,
                Err(e) => {
                    cycle.fail(SynchronizationError::for_scan(self.mapping.name(), Origin::Remote, e));
                    break;
                },
            };
            if !cycle.changed(&remote) {
                continue;
            }

            let result = match self.mapping.local().find_linked(remote.id()).await {
                Ok(Some(local)) => self.reconcile(cycle, &local, &remote).await,
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                cycle.fail(SynchronizationError::for_instance(self.mapping.name(), &remote, e));
            }
        }
    }

    async fn sync_from_local(&self, cycle: &mut Cycle<'_>) {
        let mut scan = self.mapping.local().recently_changed(cycle.window());
        while let Some(item) = scan.next().await {
            let local = match item {
                Ok(instance) => instance,
                Err(e) => {
                    cycle.fail(SynchronizationError::for_scan(self.mapping.name(), Origin::Local, e));
                    break;
                },
            };
            let Some(remote_id) = local.remote_id() else {
                continue;
            };
            if !cycle.changed(&local) {
                continue;
            }

            let result = match self.mapping.remote().find(remote_id).await {
                Ok(Some(remote)) => self.reconcile(cycle, &local, &remote).await,
                Ok(None) => {
                    warn!(record_id = %local.id(), remote_id, "linked remote record not found");
                    cycle.cache_timestamp(&local);
                    cycle.report_mut().skipped += 1;
                    Ok(())
                },
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                cycle.fail(SynchronizationError::for_instance(self.mapping.name(), &local, e));
            }
        }
    }

    async fn reconcile(
        &self,
        cycle: &mut Cycle<'_>,
        local: &Instance,
        remote: &Instance,
    ) -> Result<(), TypedError> {
        match decide(local, remote, cycle.tolerance()) {
            Decision::UpdateLocal => {
                let updated = self.mapping.local().update(local, remote).await?;
                debug!(record_id = %local.id(), remote_id = %remote.id(), "local record updated");
                cycle.cache_timestamp(remote);
                cycle.cache_timestamp(&updated);
                cycle.report_mut().updated_local += 1;
            },
            Decision::UpdateRemote => {
                let updated = self.mapping.remote().update(remote, local).await?;
                let watermark = updated.last_update().max(local.last_update());
                let marked = self.mapping.local().mark_synchronized(local, watermark).await?;
                debug!(record_id = %local.id(), remote_id = %remote.id(), "remote record updated");
                cycle.cache_timestamp(&marked);
                cycle.cache_timestamp(&updated);
                cycle.report_mut().updated_remote += 1;
            },
            Decision::UpToDate => {
                cycle.cache_timestamp(local);
                cycle.cache_timestamp(remote);
                cycle.report_mut().skipped += 1;
            },
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    fn pair(local_mod: i64, watermark: Option<i64>, remote_mod: i64) -> (Instance, Instance) {
        let local = Instance::local("1", Default::default(), ts(local_mod))
            .with_remote_id(Some("a0M1".into()))
            .with_synchronized_at(watermark.map(ts));
        let remote = Instance::remote("a0M1", Default::default(), ts(remote_mod));
        (local, remote)
    }

    #[test]
    fn test_stale_watermark_pulls_remote() {
        let (local, remote) = pair(1_000, Some(1_000), 2_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpdateLocal);
    }

    #[test]
    fn test_current_watermark_is_noop() {
        let (local, remote) = pair(2_000, Some(2_000), 2_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpToDate);

        let (local, remote) = pair(2_000, Some(3_000), 2_500);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpToDate);
    }

    #[test]
    fn test_local_edit_pushes_to_remote() {
        let (local, remote) = pair(5_000, Some(2_000), 2_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpdateRemote);
    }

    #[test]
    fn test_both_changed_newest_wins() {
        let (local, remote) = pair(5_000, Some(2_000), 4_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpdateRemote);

        let (local, remote) = pair(4_000, Some(2_000), 5_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpdateLocal);
    }

    #[test]
    fn test_equal_timestamps_are_left_alone() {
        let (local, remote) = pair(5_000, Some(2_000), 5_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpToDate);
    }

    #[test]
    fn test_missing_watermark_trusts_remote() {
        let (local, remote) = pair(9_000, None, 1_000);
        assert_eq!(decide(&local, &remote, Duration::zero()), Decision::UpdateLocal);
    }

    #[test]
    fn test_oversized_tolerance_does_not_overflow() {
        let (local, remote) = pair(5_000, Some(2_000), 4_000);
        assert_eq!(decide(&local, &remote, Duration::max_value()), Decision::UpToDate);
    }

    #[test]
    fn test_tolerance_absorbs_small_drift() {
        let (local, remote) = pair(2_000, Some(2_000), 2_400);
        assert_eq!(decide(&local, &remote, Duration::milliseconds(500)), Decision::UpToDate);
        assert_eq!(decide(&local, &remote, Duration::milliseconds(100)), Decision::UpdateLocal);
    }
}
