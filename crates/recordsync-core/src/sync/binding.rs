//! Declaration of one local/remote record pairing.

use recordsync_types::{ConfigError, FieldMapping, Mapping};
use std::fmt;
use std::sync::Arc;

use super::record_types::{LocalRecordType, RemoteRecordType};
use super::strategy::{AlwaysStrategy, Strategy};
use crate::modules::repository::{LocalStore, RemoteStore};

const DEFAULT_BATCH_SIZE: usize = 200;

/// Builder for a [`SyncMapping`].
///
/// ```ignore
/// let mapping = RecordBinding::new("custom_objects", local, remote)
///     .add_mappings([FieldMapping::new("name", "Name")])?
///     .with_strategy(Arc::new(PassiveStrategy))
///     .build()?;
/// ```
pub struct RecordBinding {
    name: String,
    local_label: String,
    remote_label: String,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    mapping: Mapping,
    strategy: Arc<dyn Strategy>,
    batch_size: usize,
}

impl RecordBinding {
    pub fn new(
        name: impl Into<String>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let name = name.into();
        Self {
            local_label: name.clone(),
            remote_label: name.clone(),
            name,
            local,
            remote,
            mapping: Mapping::new(),
            strategy: Arc::new(AlwaysStrategy),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Store names used in log lines (table and object names).
    pub fn with_labels(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.local_label = local.into();
        self.remote_label = remote.into();
        self
    }

    pub fn add_mappings(
        mut self,
        fields: impl IntoIterator<Item = FieldMapping>,
    ) -> Result<Self, ConfigError> {
        self.mapping.add_mappings(fields)?;
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn build(self) -> Result<SyncMapping, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("mappings.name", "mapping name is empty"));
        }
        if self.mapping.is_empty() {
            return Err(ConfigError::invalid(
                "mappings.fields",
                format!("mapping {} binds no fields", self.name),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }

        let mapping = Arc::new(self.mapping);
        let local = LocalRecordType::new(self.local_label, self.local, Arc::clone(&mapping))
            .with_batch_size(self.batch_size);
        let remote = RemoteRecordType::new(self.remote_label, self.remote, Arc::clone(&mapping))
            .with_batch_size(self.batch_size);

        Ok(SyncMapping { name: self.name, mapping, local, remote, strategy: self.strategy })
    }
}

/// Frozen, shareable pairing consumed by the runner.
#[derive(Clone)]
pub struct SyncMapping {
    name: String,
    mapping: Arc<Mapping>,
    local: LocalRecordType,
    remote: RemoteRecordType,
    strategy: Arc<dyn Strategy>,
}

impl SyncMapping {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn local(&self) -> &LocalRecordType {
        &self.local
    }

    pub fn remote(&self) -> &RemoteRecordType {
        &self.remote
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }
}

impl fmt::Debug for SyncMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMapping")
            .field("name", &self.name)
            .field("fields", &self.mapping.len())
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::memory_store::{MemoryLocalStore, MemoryRemoteStore};
    use crate::sync::record_types::RecordType;
    use crate::sync::strategy::PassiveStrategy;

    fn binding() -> RecordBinding {
        RecordBinding::new(
            "custom_objects",
            Arc::new(MemoryLocalStore::new()),
            Arc::new(MemoryRemoteStore::new()),
        )
    }

    #[test]
    fn test_build_shares_one_mapping() {
        let sync = binding()
            .with_labels("custom_objects", "CustomObject__c")
            .add_mappings([FieldMapping::new("name", "Name")])
            .unwrap()
            .add_mappings([FieldMapping::new("example", "Example_Field__c")])
            .unwrap()
            .with_strategy(Arc::new(PassiveStrategy))
            .build()
            .unwrap();

        assert_eq!(sync.mapping().len(), 2);
        assert_eq!(sync.remote().fields(), ["Name", "Example_Field__c"]);
        assert_eq!(sync.remote().describe(), "remote CustomObject__c");
        assert!(sync.strategy().is_passive());
    }

    #[test]
    fn test_build_rejects_empty_mapping() {
        assert!(matches!(binding().build(), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_build_rejects_zero_batch() {
        let result = binding()
            .add_mappings([FieldMapping::new("name", "Name")])
            .unwrap()
            .with_batch_size(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_conflicting_remote_field_fails() {
        let result = binding()
            .add_mappings([FieldMapping::new("name", "Name"), FieldMapping::new("title", "Name")]);
        assert!(matches!(result, Err(ConfigError::DuplicateRemoteField { .. })));
    }
}
