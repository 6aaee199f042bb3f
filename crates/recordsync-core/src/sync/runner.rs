//! One reconciliation cycle for one mapping.

use chrono::{DateTime, Duration, Utc};
use recordsync_types::{Instance, SynchronizationError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::binding::SyncMapping;
use super::cache::TimestampCache;
use super::initializer::Initializer;
use super::record_types::ScanWindow;
use super::sink::ErrorSink;
use super::synchronizer::Synchronizer;
use crate::error::AppResult;
use crate::modules::watermark::WatermarkStore;

/// Upper bound for configured tolerance and overlap, one day.
pub const MAX_SLACK_MS: u64 = 86_400_000;

/// Default backwards overlap of consecutive scan windows.
pub const DEFAULT_SCAN_OVERLAP_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Slack applied when comparing modification times with watermarks and
    /// when widening the scan window backwards.
    pub staleness_tolerance: Duration,
    /// Extra backwards widening of the scan window. Covers records whose
    /// stamp predates the previous cycle but that became visible after its
    /// scan ran (commit lag, clock skew between the two systems).
    pub scan_overlap: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            staleness_tolerance: Duration::zero(),
            scan_overlap: millis(DEFAULT_SCAN_OVERLAP_MS),
        }
    }
}

impl RunnerConfig {
    /// Values above [`MAX_SLACK_MS`] are clamped.
    pub fn with_tolerance_ms(ms: u64) -> Self {
        Self { staleness_tolerance: millis(ms), ..Self::default() }
    }

    /// Values above [`MAX_SLACK_MS`] are clamped.
    pub fn with_scan_overlap_ms(mut self, ms: u64) -> Self {
        self.scan_overlap = millis(ms);
        self
    }

    /// Lower bound of the scan window following a cycle that started at
    /// `last_run`; `None` (scan everything) when the arithmetic overflows.
    pub fn window_start(&self, last_run: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.staleness_tolerance
            .checked_add(&self.scan_overlap)
            .and_then(|slack| last_run.checked_sub_signed(slack))
    }
}

fn millis(ms: u64) -> Duration {
    i64::try_from(ms.min(MAX_SLACK_MS)).map_or(Duration::zero(), Duration::milliseconds)
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CycleReport {
    pub mapping: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub created_local: usize,
    pub created_remote: usize,
    pub updated_local: usize,
    pub updated_remote: usize,
    /// Pairs found up to date plus records filtered out or unreachable.
    pub skipped: usize,
    pub errors: usize,
    pub duration_ms: u64,
    /// Lower bound of the next cycle's scans.
    pub watermark: DateTime<Utc>,
    pub watermark_saved: bool,
}

impl CycleReport {
    fn new(mapping: &str, run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            mapping: mapping.to_string(),
            run_id,
            started_at,
            created_local: 0,
            created_remote: 0,
            updated_local: 0,
            updated_remote: 0,
            skipped: 0,
            errors: 0,
            duration_ms: 0,
            watermark: started_at,
            watermark_saved: false,
        }
    }

    /// Total store writes performed by the cycle.
    pub fn writes(&self) -> usize {
        self.created_local + self.created_remote + self.updated_local + self.updated_remote
    }
}

/// State threaded through the passes of one cycle.
pub struct Cycle<'a> {
    mapping: String,
    window: ScanWindow,
    tolerance: Duration,
    cache: TimestampCache,
    sink: &'a dyn ErrorSink,
    report: CycleReport,
}

impl<'a> Cycle<'a> {
    pub fn new(
        mapping: &str,
        run_id: String,
        window: ScanWindow,
        tolerance: Duration,
        sink: &'a dyn ErrorSink,
    ) -> Self {
        Self {
            mapping: mapping.to_string(),
            window,
            tolerance,
            cache: TimestampCache::new(),
            sink,
            report: CycleReport::new(mapping, run_id, window.until),
        }
    }

    pub fn mapping(&self) -> &str {
        &self.mapping
    }

    pub fn window(&self) -> ScanWindow {
        self.window
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    pub fn cache_timestamp(&mut self, instance: &Instance) {
        self.cache.cache_timestamp(instance);
    }

    pub fn changed(&self, instance: &Instance) -> bool {
        self.cache.changed(instance)
    }

    pub fn report(&self) -> &CycleReport {
        &self.report
    }

    pub fn into_report(self) -> CycleReport {
        self.report
    }

    pub(crate) fn report_mut(&mut self) -> &mut CycleReport {
        &mut self.report
    }

    /// Count and forward a per-record failure.
    pub(crate) fn fail(&mut self, err: SynchronizationError) {
        self.report.errors += 1;
        if let Err(sink_err) = self.sink.report(&err) {
            warn!(error = %sink_err, failure = %err, "error sink rejected report");
        }
    }
}

/// Drives cycles and owns the watermark bookkeeping.
pub struct Runner {
    watermarks: Arc<dyn WatermarkStore>,
    sink: Arc<dyn ErrorSink>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(
        watermarks: Arc<dyn WatermarkStore>,
        sink: Arc<dyn ErrorSink>,
        config: RunnerConfig,
    ) -> Self {
        Self { watermarks, sink, config }
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    pub fn watermarks(&self) -> &Arc<dyn WatermarkStore> {
        &self.watermarks
    }

    pub async fn last_run(&self, mapping: &str) -> AppResult<Option<DateTime<Utc>>> {
        self.watermarks.get(mapping).await
    }

    /// Bootstrap then reconcile everything changed since the last cycle.
    ///
    /// Only an unreadable watermark fails the call; per-record failures go to
    /// the error sink and show up in the report.
    pub async fn run(&self, mapping: &SyncMapping) -> AppResult<CycleReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("cycle", mapping = %mapping.name(), run_id = %run_id);
        self.run_cycle(mapping, run_id).instrument(span).await
    }

    async fn run_cycle(&self, mapping: &SyncMapping, run_id: String) -> AppResult<CycleReport> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let last_run = self.last_run(mapping.name()).await?;
        let tolerance = self.config.staleness_tolerance;
        let window = ScanWindow::new(
            last_run.and_then(|at| self.config.window_start(at)),
            started_at,
        );
        debug!(since = ?window.since, until = %window.until, "scan window");

        let mut cycle = Cycle::new(mapping.name(), run_id, window, tolerance, self.sink.as_ref());
        Initializer::new(mapping).run(&mut cycle).await;
        Synchronizer::new(mapping).run(&mut cycle).await;

        let mut report = cycle.into_report();
        report.duration_ms = clock.elapsed().as_millis() as u64;

        // A wall clock stepping backwards must not rewind the watermark.
        let watermark = last_run.map_or(started_at, |previous| previous.max(started_at));
        report.watermark = watermark;
        match self.watermarks.set(mapping.name(), watermark).await {
            Ok(()) => report.watermark_saved = true,
            Err(e) => error!(error = %e, "failed to persist watermark"),
        }

        info!(
            created_local = report.created_local,
            created_remote = report.created_remote,
            updated_local = report.updated_local,
            updated_remote = report.updated_remote,
            skipped = report.skipped,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "cycle complete"
        );
        Ok(report)
    }
}
