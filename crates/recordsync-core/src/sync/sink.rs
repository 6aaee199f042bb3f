//! Destinations for per-record synchronization failures.

use parking_lot::Mutex;
use recordsync_types::SynchronizationError;
use thiserror::Error;
use tracing::error;

/// The sink itself failed; the engine logs it and carries on.
#[derive(Debug, Error)]
#[error("error sink failed: {message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &SynchronizationError) -> Result<(), SinkError>;
}

/// Emits each failure as a structured `error!` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &SynchronizationError) -> Result<(), SinkError> {
        error!(
            mapping = %err.mapping,
            origin = %err.origin,
            record_id = err.record_id.as_deref().unwrap_or("<scan>"),
            error = %err.source,
            "synchronization failed"
        );
        Ok(())
    }
}

/// Keeps every reported failure in memory.
#[derive(Debug, Default)]
pub struct CollectingErrorSink {
    errors: Mutex<Vec<SynchronizationError>>,
}

impl CollectingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<SynchronizationError> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Drain collected failures.
    pub fn take(&self) -> Vec<SynchronizationError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&self, err: &SynchronizationError) -> Result<(), SinkError> {
        self.errors.lock().push(err.clone());
        Ok(())
    }
}
