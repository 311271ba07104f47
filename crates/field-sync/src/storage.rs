//! Durable backing stores for the offline queue.
//!
//! The queue only needs three primitives: load everything, replace
//! everything, clear. Replacement must be atomic so a crash mid-write never
//! leaves a truncated queue behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::ops::OfflineOperation;
use crate::SyncError;

#[async_trait]
pub trait QueueStorage: Send + Sync {
    async fn load(&self) -> Result<Vec<OfflineOperation>, SyncError>;
    async fn save(&self, operations: &[OfflineOperation]) -> Result<(), SyncError>;
    async fn clear(&self) -> Result<(), SyncError>;
}

/// JSON file storage. Writes go to a sibling temp file, are flushed to disk
/// and then renamed into place.
///
/// Records that cannot be read back are never discarded: the file as found is
/// copied to `<name>.corrupt-<millis>` before the readable records are kept.
pub struct FileQueueStorage {
    path: PathBuf,
}

impl FileQueueStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "offline-queue".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    /// Copies the unreadable file aside, then rewrites the queue with the
    /// operations that did parse so later loads are clean.
    async fn quarantine(
        &self,
        raw: &str,
        salvaged: &[OfflineOperation],
        dropped: usize,
    ) -> Result<(), SyncError> {
        let target = self.sibling(&format!(".corrupt-{}", Utc::now().timestamp_millis()));
        tokio::fs::write(&target, raw).await?;
        error!(
            "Offline queue at {} had {dropped} unreadable record(s); original saved to {}",
            self.path.display(),
            target.display()
        );
        self.save(salvaged).await
    }
}

/// Parses each record on its own. Returns the readable operations and how
/// many records were skipped; a document that is not a JSON array counts as
/// one unreadable record.
fn parse_records(raw: &str) -> (Vec<OfflineOperation>, usize) {
    let Ok(Value::Array(records)) = serde_json::from_str::<Value>(raw) else {
        return (Vec::new(), 1);
    };
    let total = records.len();
    let operations: Vec<OfflineOperation> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(op) => Some(op),
            Err(e) => {
                warn!("Skipping unreadable offline operation: {e}");
                None
            }
        })
        .collect();
    let dropped = total - operations.len();
    (operations, dropped)
}

#[async_trait]
impl QueueStorage for FileQueueStorage {
    async fn load(&self) -> Result<Vec<OfflineOperation>, SyncError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let (operations, dropped) = parse_records(&raw);
        if dropped > 0 {
            self.quarantine(&raw, &operations, dropped).await?;
        }
        Ok(operations)
    }

    async fn save(&self, operations: &[OfflineOperation]) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec(operations)?;
        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SyncError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage, for tests and platforms that persist elsewhere.
#[derive(Default)]
pub struct MemoryQueueStorage {
    operations: Mutex<Vec<OfflineOperation>>,
}

impl MemoryQueueStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStorage for MemoryQueueStorage {
    async fn load(&self) -> Result<Vec<OfflineOperation>, SyncError> {
        Ok(self.operations.lock().await.clone())
    }

    async fn save(&self, operations: &[OfflineOperation]) -> Result<(), SyncError> {
        *self.operations.lock().await = operations.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), SyncError> {
        self.operations.lock().await.clear();
        Ok(())
    }
}
