//! Bootstrap pass: create counterparts for records that exist on one side only.

use futures::StreamExt;
use recordsync_types::{Instance, Origin, SynchronizationError, TypedError};
use tracing::debug;

use super::binding::SyncMapping;
use super::record_types::RecordType;
use super::runner::Cycle;

pub struct Initializer<'m> {
    mapping: &'m SyncMapping,
}

impl<'m> Initializer<'m> {
    pub fn new(mapping: &'m SyncMapping) -> Self {
        Self { mapping }
    }

    pub async fn run(&self, cycle: &mut Cycle<'_>) {
        if self.mapping.strategy().is_passive() {
            debug!("passive mapping, bootstrap skipped");
            return;
        }
        self.build_local(cycle).await;
        self.build_remote(cycle).await;
    }

    async fn build_local(&self, cycle: &mut Cycle<'_>) {
        let mut scan = self.mapping.remote().recently_changed(cycle.window());
        while let Some(item) = scan.next().await {
            let instance = match item {
                Ok(instance) => instance,
                Err(e) => {
                    cycle.fail(SynchronizationError::for_scan(self.mapping.name(), Origin::Remote, e));
                    break;
                },
            };
            if !cycle.changed(&instance) {
                continue;
            }
            if let Err(e) = self.create_local(cycle, &instance).await {
                cycle.fail(SynchronizationError::for_instance(self.mapping.name(), &instance, e));
            }
        }
    }

    async fn create_local(&self, cycle: &mut Cycle<'_>, remote: &Instance) -> Result<(), TypedError> {
        let local = self.mapping.local();
        if local.find_linked(remote.id()).await?.is_some() {
            return Ok(());
        }
        if !self.mapping.strategy().should_build(remote) {
            debug!(record_id = %remote.id(), strategy = self.mapping.strategy().name(), "not built");
            cycle.cache_timestamp(remote);
            cycle.report_mut().skipped += 1;
            return Ok(());
        }

        let created = local.create(remote).await?;
        debug!(record_id = %remote.id(), local_id = %created.id(), "created local record");
        cycle.cache_timestamp(remote);
        cycle.cache_timestamp(&created);
        cycle.report_mut().created_local += 1;
        Ok(())
    }

    async fn build_remote(&self, cycle: &mut Cycle<'_>) {
        let mut scan = self.mapping.local().recently_changed(cycle.window());
        while let Some(item) = scan.next().await {
            let instance = match item {
                Ok(instance) => instance,
                Err(e) => {
                    cycle.fail(SynchronizationError::for_scan(self.mapping.name(), Origin::Local, e));
                    break;
                },
            };
            if instance.is_synced() || !cycle.changed(&instance) {
                continue;
            }
            if let Err(e) = self.create_remote(cycle, &instance).await {
                cycle.fail(SynchronizationError::for_instance(self.mapping.name(), &instance, e));
            }
        }
    }

    async fn create_remote(&self, cycle: &mut Cycle<'_>, local: &Instance) -> Result<(), TypedError> {
        let created = self.mapping.remote().create(local).await?;
        let linked = self.mapping.local().link(local, &created).await?;
        debug!(record_id = %local.id(), remote_id = %created.id(), "created remote record");
        cycle.cache_timestamp(&linked);
        cycle.cache_timestamp(&created);
        cycle.report_mut().created_remote += 1;
        Ok(())
    }
}
