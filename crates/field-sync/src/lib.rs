//! Offline operation queue for the ranch journal field client.
//!
//! Mutations made while the device is disconnected are captured as
//! [`OfflineOperation`]s, persisted through a [`QueueStorage`], and replayed
//! against the server's sync endpoint once connectivity returns. The wire
//! types in [`ops`] are shared with the server so both sides agree on the
//! batch shape and the per-operation result contract.

pub mod ops;
pub mod queue;
pub mod storage;
pub mod transport;

use thiserror::Error;

pub use ops::{
    OfflineOperation, OperationKind, OperationResult, SyncRequest, SyncResponse, MAX_SYNC_BATCH,
};
pub use queue::{FlushReport, OfflineQueue, QueueState, SyncEvent};
pub use storage::{FileQueueStorage, MemoryQueueStorage, QueueStorage};
pub use transport::{HttpSyncTransport, SyncTransport};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("queue storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sync endpoint returned status {status}: {message}")]
    Server { status: u16, message: String },

    #[error("batch of {0} operations exceeds the limit of {MAX_SYNC_BATCH}")]
    BatchTooLarge(usize),
}
