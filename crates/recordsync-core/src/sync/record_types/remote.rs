use async_stream::try_stream;
use async_trait::async_trait;
use recordsync_types::{Instance, Mapping, Origin, TypedError};
use std::sync::Arc;

use super::{InstanceStream, RecordType, ScanWindow};
use crate::modules::repository::{RemoteRecord, RemoteStore, ScanCursor};

const DEFAULT_BATCH_SIZE: usize = 200;

/// Adapter over a [`RemoteStore`]. Loads only the remote fields the mapping
/// binds.
#[derive(Clone)]
pub struct RemoteRecordType {
    label: String,
    store: Arc<dyn RemoteStore>,
    mapping: Arc<Mapping>,
    fields: Vec<String>,
    batch_size: usize,
}

impl RemoteRecordType {
    pub fn new(
        label: impl Into<String>,
        store: Arc<dyn RemoteStore>,
        mapping: Arc<Mapping>,
    ) -> Self {
        let fields = mapping.remote_fields().map(str::to_string).collect();
        Self { label: label.into(), store, mapping, fields, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn to_instance(record: RemoteRecord) -> Instance {
    Instance::remote(record.id, record.fields, record.last_modified)
}

#[async_trait]
impl RecordType for RemoteRecordType {
    fn origin(&self) -> Origin {
        Origin::Remote
    }

    fn describe(&self) -> String {
        format!("remote {}", self.label)
    }

    async fn find(&self, id: &str) -> Result<Option<Instance>, TypedError> {
        Ok(self.store.find(id, &self.fields).await?.map(to_instance))
    }

    async fn create(&self, source: &Instance) -> Result<Instance, TypedError> {
        let fields = self.mapping.translate(source.origin(), Origin::Remote, source.attributes())?;
        Ok(to_instance(self.store.create(&fields).await?))
    }

    async fn update(&self, target: &Instance, source: &Instance) -> Result<Instance, TypedError> {
        let fields = self.mapping.translate(source.origin(), Origin::Remote, source.attributes())?;
        Ok(to_instance(self.store.update(target.id(), &fields).await?))
    }

    fn recently_changed(&self, window: ScanWindow) -> InstanceStream<'_> {
        Box::pin(try_stream! {
            let mut cursor = ScanCursor::Start(window.since);
            loop {
                let page = self
                    .store
                    .query_recent(&self.fields, &cursor, window.until, self.batch_size)
                    .await
                    .map_err(TypedError::from)?;
                let exhausted = page.len() < self.batch_size;
                cursor = match page.last() {
                    Some(last) => ScanCursor::After { timestamp: last.last_modified, id: last.id.clone() },
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
