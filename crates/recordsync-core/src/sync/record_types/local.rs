use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recordsync_types::{Instance, LocalStoreError, Mapping, Origin, TypedError};
use std::sync::Arc;

use super::{InstanceStream, RecordType, ScanWindow};
use crate::modules::repository::{LocalRecord, LocalStore, ScanCursor, SyncLink};

const DEFAULT_BATCH_SIZE: usize = 200;

/// Adapter over a [`LocalStore`].
///
/// Besides the shared capabilities it owns the link bookkeeping: which remote
/// record a local row mirrors and when the pair was last reconciled.
#[derive(Clone)]
pub struct LocalRecordType {
    label: String,
    store: Arc<dyn LocalStore>,
    mapping: Arc<Mapping>,
    batch_size: usize,
}

impl LocalRecordType {
    pub fn new(label: impl Into<String>, store: Arc<dyn LocalStore>, mapping: Arc<Mapping>) -> Self {
        Self { label: label.into(), store, mapping, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Local record mirroring the remote record `remote_id`, if any.
    pub async fn find_linked(&self, remote_id: &str) -> Result<Option<Instance>, TypedError> {
        Ok(self.store.find_linked(remote_id).await?.map(to_instance))
    }

    /// Record `remote` as the counterpart of `local`.
    ///
    /// The watermark is the later of both modification times so neither side
    /// looks changed on the next cycle.
    pub async fn link(&self, local: &Instance, remote: &Instance) -> Result<Instance, TypedError> {
        let id = parse_id(local.id())?;
        let at = local.last_update().max(remote.last_update());
        Ok(to_instance(self.store.link(id, remote.id(), at).await?))
    }

    pub async fn mark_synchronized(
        &self,
        local: &Instance,
        at: DateTime<Utc>,
    ) -> Result<Instance, TypedError> {
        let id = parse_id(local.id())?;
        Ok(to_instance(self.store.mark_synchronized(id, at).await?))
    }
}

fn parse_id(id: &str) -> Result<i64, LocalStoreError> {
    id.parse().map_err(|_| LocalStoreError::NotFound { id: id.to_string() })
}

fn to_instance(record: LocalRecord) -> Instance {
    Instance::local(record.id.to_string(), record.attributes, record.updated_at)
        .with_remote_id(record.remote_id)
        .with_synchronized_at(record.synchronized_at)
}

#[async_trait]
impl RecordType for LocalRecordType {
    fn origin(&self) -> Origin {
        Origin::Local
    }

    fn describe(&self) -> String {
        format!("local {}", self.label)
    }

    async fn find(&self, id: &str) -> Result<Option<Instance>, TypedError> {
        let Ok(id) = id.parse::<i64>() else {
            return Ok(None);
        };
        Ok(self.store.find(id).await?.map(to_instance))
    }

    async fn create(&self, source: &Instance) -> Result<Instance, TypedError> {
        let attributes = self.mapping.translate(source.origin(), Origin::Local, source.attributes())?;
        let link = (source.origin() == Origin::Remote).then(|| SyncLink {
            remote_id: source.id().to_string(),
            synchronized_at: source.last_update(),
        });
        Ok(to_instance(self.store.create(&attributes, link).await?))
    }

    async fn update(&self, target: &Instance, source: &Instance) -> Result<Instance, TypedError> {
        let id = parse_id(target.id())?;
        let attributes = self.mapping.translate(source.origin(), Origin::Local, source.attributes())?;
        Ok(to_instance(self.store.update(id, &attributes, source.last_update()).await?))
    }

    fn recently_changed(&self, window: ScanWindow) -> InstanceStream<'_> {
        Box::pin(try_stream! {
            let mut cursor = ScanCursor::Start(window.since);
            loop {
                let page = self
                    .store
                    .query_recent(&cursor, window.until, self.batch_size)
                    .await
                    .map_err(TypedError::from)?;
                let exhausted = page.len() < self.batch_size;
                cursor = match page.last() {
                    Some(last) => ScanCursor::After { timestamp: last.updated_at, id: last.id },
                    None => break,
                };

                for record in page {
                    yield to_instance(record);
                }
                if exhausted {
                    break;
                }
            }
        })
    }
}
