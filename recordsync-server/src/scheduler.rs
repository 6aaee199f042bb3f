//! Polling loop: one task per mapping, each on its own ticker.
//!
//! A mapping never overlaps with itself; a cycle that outlasts the interval
//! swallows the missed ticks. Shutdown is observed between cycles only, so an
//! in-flight cycle always finishes and records its watermark.

use recordsync_core::{Engine, SyncMapping};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

pub async fn serve(engine: Arc<Engine>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    for mapping in engine.mappings() {
        tasks.spawn(run_mapping(engine.clone(), mapping.clone(), shutdown_rx.clone()));
    }
    tracing::info!(
        mappings = engine.mappings().len(),
        interval_secs = engine.interval().as_secs(),
        "scheduler started"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutdown requested, waiting for running cycles");
        }
        Some(joined) = tasks.join_next() => {
            if let Err(e) = joined {
                tracing::error!(error = %e, "mapping task ended unexpectedly");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "mapping task panicked");
        }
    }
    tracing::info!("scheduler stopped");
    Ok(())
}

async fn run_mapping(engine: Arc<Engine>, mapping: SyncMapping, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(engine.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        match engine.runner().run(&mapping).await {
            Ok(report) if report.errors > 0 => {
                tracing::warn!(
                    mapping = %mapping.name(),
                    errors = report.errors,
                    "cycle finished with record errors"
                );
            },
            Ok(report) if report.writes() == 0 => {
                tracing::debug!(mapping = %mapping.name(), "no changes");
            },
            Ok(_) => {},
            // The next tick retries from the same watermark.
            Err(e) => tracing::error!(mapping = %mapping.name(), error = %e, "cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordsync_core::modules::memory_store::{MemoryLocalStore, MemoryRemoteStore};
    use recordsync_core::modules::watermark::{MemoryWatermarkStore, WatermarkStore};
    use recordsync_core::sync::CollectingErrorSink;
    use recordsync_core::{RecordBinding, Runner, RunnerConfig};
    use recordsync_types::FieldMapping;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mapping_task_runs_and_stops_on_shutdown() {
        let watermarks = Arc::new(MemoryWatermarkStore::new());
        let mapping = RecordBinding::new(
            "accounts",
            Arc::new(MemoryLocalStore::new()),
            Arc::new(MemoryRemoteStore::new()),
        )
        .add_mappings([FieldMapping::new("name", "Name")])
        .expect("valid fields")
        .build()
        .expect("valid binding");
        let runner = Runner::new(
            watermarks.clone(),
            Arc::new(CollectingErrorSink::new()),
            RunnerConfig::default(),
        );
        let engine = Arc::new(Engine::new(runner, vec![mapping.clone()], Duration::from_secs(3600)));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_mapping(engine, mapping, rx));

        // The first tick fires immediately.
        for _ in 0..100 {
            if watermarks.get("accounts").await.expect("memory store").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(watermarks.get("accounts").await.expect("memory store").is_some());

        tx.send(true).expect("task alive");
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("task stops")
            .expect("task does not panic");
    }
}
