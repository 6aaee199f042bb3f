//! Persisted `last_run` watermarks, one per mapping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

pub type Watermarks = BTreeMap<String, DateTime<Utc>>;

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, mapping: &str) -> AppResult<Option<DateTime<Utc>>>;

    async fn set(&self, mapping: &str, at: DateTime<Utc>) -> AppResult<()>;

    /// Forget the watermark so the next cycle scans everything. Returns
    /// whether one existed.
    async fn reset(&self, mapping: &str) -> AppResult<bool>;

    async fn all(&self) -> AppResult<Watermarks>;
}

#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    marks: Mutex<Watermarks>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn get(&self, mapping: &str) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.marks.lock().get(mapping).copied())
    }

    async fn set(&self, mapping: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.marks.lock().insert(mapping.to_string(), at);
        Ok(())
    }

    async fn reset(&self, mapping: &str) -> AppResult<bool> {
        Ok(self.marks.lock().remove(mapping).is_some())
    }

    async fn all(&self) -> AppResult<Watermarks> {
        Ok(self.marks.lock().clone())
    }
}

/// JSON object of mapping name to RFC 3339 timestamp.
///
/// Every write rewrites the whole file through a temp file and a rename.
/// Mapping tasks share one store, so read-modify-write is serialized.
#[derive(Debug)]
pub struct FileWatermarkStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> AppResult<Watermarks> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Watermarks::new()),
            Err(e) => return Err(AppError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Watermarks::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            AppError::Watermark(format!("{} is not a watermark file: {}", self.path.display(), e))
        })
    }

    async fn save(&self, marks: &Watermarks) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(marks)?;
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn get(&self, mapping: &str) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.load().await?.get(mapping).copied())
    }

    async fn set(&self, mapping: &str, at: DateTime<Utc>) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut marks = self.load().await?;
        marks.insert(mapping.to_string(), at);
        self.save(&marks).await
    }

    async fn reset(&self, mapping: &str) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut marks = self.load().await?;
        let existed = marks.remove(mapping).is_some();
        if existed {
            self.save(&marks).await?;
        }
        Ok(existed)
    }

    async fn all(&self) -> AppResult<Watermarks> {
        self.load().await
    }
}
