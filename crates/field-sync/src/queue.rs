//! Client-side offline queue state machine.
//!
//! States: `Idle` (nothing stored) → `Queued` (operations stored, not yet
//! confirmed) → `Syncing` (flush in flight) → back to `Idle` or `Queued`.
//!
//! A flush works from a snapshot of the stored queue taken when it starts.
//! Only operations the server confirmed are removed afterwards, and removal
//! re-reads storage, so anything enqueued while the flush was in flight
//! survives for the next one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::ops::{OfflineOperation, OperationKind, OperationResult, MAX_SYNC_BATCH};
use crate::storage::QueueStorage;
use crate::transport::SyncTransport;
use crate::SyncError;

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Queued,
    Syncing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Flushed { succeeded: usize, failed: usize },
    /// At least one operation landed on the server; cached views are stale.
    RefreshViews,
}

/// What a flush attempt did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Operations sent to the server.
    pub attempted: usize,
    /// Ids the server confirmed; these were removed from storage.
    pub succeeded: Vec<String>,
    /// Operations still queued, with the reason they failed.
    pub failed: Vec<OperationResult>,
    /// True when the flush did nothing because another flush was running or
    /// the client is offline.
    pub skipped: bool,
}

impl FlushReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Resets the re-entrancy flag however the flush exits.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct OfflineQueue<S, T> {
    storage: S,
    transport: T,
    online: AtomicBool,
    syncing: AtomicBool,
    pending: AtomicUsize,
    /// Serialises read-modify-write cycles against storage.
    write_lock: Mutex<()>,
    events: broadcast::Sender<SyncEvent>,
}

impl<S: QueueStorage, T: SyncTransport> OfflineQueue<S, T> {
    pub fn new(storage: S, transport: T, online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            transport,
            online: AtomicBool::new(online),
            syncing: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            write_lock: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> QueueState {
        if self.syncing.load(Ordering::SeqCst) {
            QueueState::Syncing
        } else if self.pending_count() > 0 {
            QueueState::Queued
        } else {
            QueueState::Idle
        }
    }

    pub async fn operations(&self) -> Result<Vec<OfflineOperation>, SyncError> {
        self.storage.load().await
    }

    /// Records a mutation intent. The operation is durable before this returns.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        payload: serde_json::Value,
    ) -> Result<OfflineOperation, SyncError> {
        let operation = OfflineOperation::new(kind, payload);
        let _lock = self.write_lock.lock().await;
        let mut stored = self.storage.load().await?;
        stored.push(operation.clone());
        self.storage.save(&stored).await?;
        self.pending.store(stored.len(), Ordering::SeqCst);
        info!(
            "Queued offline {} operation {} ({} pending)",
            kind.as_str(),
            operation.id,
            stored.len()
        );
        Ok(operation)
    }

    /// Startup hook: loads the stored queue and flushes it if already online.
    pub async fn mount(&self) -> Result<Option<FlushReport>, SyncError> {
        let stored = self.storage.load().await?;
        self.pending.store(stored.len(), Ordering::SeqCst);
        if self.is_online() && !stored.is_empty() {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    /// Feeds a connectivity change in. An offline→online transition with
    /// work pending triggers a flush.
    pub async fn set_online(&self, online: bool) -> Result<Option<FlushReport>, SyncError> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online && self.pending_count() > 0 {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    pub async fn clear(&self) -> Result<(), SyncError> {
        let _lock = self.write_lock.lock().await;
        self.storage.clear().await?;
        self.pending.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Sends the stored queue to the server in batches of at most
    /// [`MAX_SYNC_BATCH`] and drops exactly the confirmed operations.
    pub async fn flush(&self) -> Result<FlushReport, SyncError> {
        if !self.is_online() {
            return Ok(FlushReport::skipped());
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(FlushReport::skipped());
        }
        let _guard = SyncingGuard(&self.syncing);

        let snapshot = self.storage.load().await?;
        if snapshot.is_empty() {
            self.pending.store(0, Ordering::SeqCst);
            return Ok(FlushReport::default());
        }

        let mut succeeded: HashSet<String> = HashSet::new();
        let mut failures: Vec<OperationResult> = Vec::new();
        let mut attempted = 0;

        for (index, batch) in snapshot.chunks(MAX_SYNC_BATCH).enumerate() {
            let results = match self.transport.push(batch).await {
                Ok(results) => results,
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    warn!("Offline sync stopped after {attempted} operations: {e}");
                    let message = e.to_string();
                    failures.extend(
                        snapshot[attempted..]
                            .iter()
                            .map(|op| OperationResult::failed(&op.id, &message)),
                    );
                    break;
                }
            };
            attempted += batch.len();
            failures.extend(match_results(batch, results, &mut succeeded));
        }

        if !succeeded.is_empty() {
            let _lock = self.write_lock.lock().await;
            let remaining: Vec<OfflineOperation> = self
                .storage
                .load()
                .await?
                .into_iter()
                .filter(|op| !succeeded.contains(&op.id))
                .collect();
            self.storage.save(&remaining).await?;
            self.pending.store(remaining.len(), Ordering::SeqCst);
        }

        info!(
            "Offline sync finished: {} succeeded, {} still queued",
            succeeded.len(),
            failures.len()
        );
        for failure in &failures {
            warn!(
                "Offline operation {} failed: {}",
                failure.id,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }

        // Nobody listening is fine.
        let _ = self.events.send(SyncEvent::Flushed {
            succeeded: succeeded.len(),
            failed: failures.len(),
        });
        if !succeeded.is_empty() {
            let _ = self.events.send(SyncEvent::RefreshViews);
        }

        let succeeded_ids = snapshot
            .iter()
            .filter(|op| succeeded.contains(&op.id))
            .map(|op| op.id.clone())
            .collect();

        Ok(FlushReport {
            attempted,
            succeeded: succeeded_ids,
            failed: failures,
            skipped: false,
        })
    }
}

/// Pairs server results with the batch by id. Operations without a result
/// count as failed and stay queued.
fn match_results(
    batch: &[OfflineOperation],
    results: Vec<OperationResult>,
    succeeded: &mut HashSet<String>,
) -> Vec<OperationResult> {
    let batch_ids: HashSet<&str> = batch.iter().map(|op| op.id.as_str()).collect();
    let mut reported: HashSet<String> = HashSet::new();
    let mut failures = Vec::new();

    for result in results {
        if !batch_ids.contains(result.id.as_str()) {
            warn!("Ignoring sync result for unknown operation {}", result.id);
            continue;
        }
        reported.insert(result.id.clone());
        if result.success {
            succeeded.insert(result.id);
        } else {
            failures.push(result);
        }
    }

    failures.extend(
        batch
            .iter()
            .filter(|op| !reported.contains(&op.id))
            .map(|op| OperationResult::failed(&op.id, "No result returned by server")),
    );
    failures
}
