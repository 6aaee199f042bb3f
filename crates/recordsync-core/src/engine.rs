//! Wiring from a [`SyncConfig`] to ready-to-run mappings.

use recordsync_types::TypedError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::modules::config::SyncConfig;
use crate::modules::sqlite_store::{LocalTable, SqliteDatabase};
use crate::modules::watermark::FileWatermarkStore;
use crate::remote::HttpRemoteStore;
use crate::sync::{CycleReport, RecordBinding, Runner, RunnerConfig, SyncMapping, TracingErrorSink};
use crate::utils::http::{create_client, redact_url};

/// Every configured mapping plus the runner that drives them.
pub struct Engine {
    runner: Runner,
    mappings: Vec<SyncMapping>,
    interval: Duration,
}

impl Engine {
    pub fn new(runner: Runner, mappings: Vec<SyncMapping>, interval: Duration) -> Self {
        Self { runner, mappings, interval }
    }

    /// Open the SQLite database (creating mapped tables), build one HTTP store
    /// per remote object and a file-backed watermark store.
    pub async fn from_config(config: &SyncConfig) -> AppResult<Self> {
        let database_path = config.database_path()?;
        let db = SqliteDatabase::open(&database_path)?;
        let client = create_client(config.remote.timeout_secs)?;

        let mut mappings = Vec::with_capacity(config.mappings.len());
        for declared in &config.mappings {
            let fields = declared.field_mapping()?;
            let local = db.table(LocalTable::new(&declared.local_table, fields.local_fields())?);
            local.ensure_table().await.map_err(TypedError::from)?;
            let remote = HttpRemoteStore::new(client.clone(), &config.remote, &declared.remote_object)?;

            let mapping = RecordBinding::new(&declared.name, Arc::new(local), Arc::new(remote))
                .with_labels(&declared.local_table, &declared.remote_object)
                .add_mappings(declared.fields.iter().cloned())?
                .with_strategy(declared.strategy.build())
                .with_batch_size(config.batch_size)
                .build()?;
            mappings.push(mapping);
        }

        let watermarks = Arc::new(FileWatermarkStore::new(config.watermark_path()?));
        let runner = Runner::new(
            watermarks,
            Arc::new(TracingErrorSink),
            RunnerConfig::with_tolerance_ms(config.staleness_tolerance_ms)
                .with_scan_overlap_ms(config.scan_overlap_ms),
        );

        info!(
            database = %database_path.display(),
            remote = %redact_url(&config.remote.base_url),
            mappings = mappings.len(),
            "engine ready"
        );
        Ok(Self::new(runner, mappings, Duration::from_secs(config.interval_secs)))
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn mappings(&self) -> &[SyncMapping] {
        &self.mappings
    }

    pub fn mapping(&self, name: &str) -> AppResult<&SyncMapping> {
        self.mappings
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| AppError::UnknownMapping(name.to_string()))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One cycle of `name`, or of every mapping in declaration order.
    pub async fn run_once(&self, name: Option<&str>) -> AppResult<Vec<CycleReport>> {
        match name {
            Some(name) => Ok(vec![self.runner.run(self.mapping(name)?).await?]),
            None => {
                let mut reports = Vec::with_capacity(self.mappings.len());
                for mapping in &self.mappings {
                    reports.push(self.runner.run(mapping).await?);
                }
                Ok(reports)
            },
        }
    }
}
