//! Keeps `entry_embeddings` in step with diary entries.
//!
//! Entry writes never wait on embedding: they push a job onto a bounded
//! channel and a single worker task drains it. A failed job is logged and
//! dropped; the entry stays usable, it just won't be retrieved until the
//! next successful re-embed.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::journal::repository::JournalRepository;
use crate::rag::embedding::Embedder;
use crate::rag::format::format_entry_for_rag;
use crate::rag::vector_store::VectorStore;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Canonicalizes, embeds and upserts one entry. Returns `false` when the
/// entry no longer exists for `owner_id`.
pub async fn index_entry(
    repo: &dyn JournalRepository,
    embedder: &dyn Embedder,
    vectors: &dyn VectorStore,
    owner_id: Uuid,
    entry_id: Uuid,
) -> Result<bool> {
    let Some(entry) = repo
        .rag_entry(owner_id, entry_id)
        .await
        .context("failed to load entry for embedding")?
    else {
        return Ok(false);
    };

    let text = format_entry_for_rag(&entry);
    let vector = embedder
        .embed(&text)
        .await
        .with_context(|| format!("failed to embed entry {entry_id}"))?;
    vectors
        .upsert(entry_id, owner_id, &text, &vector)
        .await
        .with_context(|| format!("failed to store embedding for entry {entry_id}"))?;

    debug!("Indexed entry {entry_id} ({} dims)", vector.len());
    Ok(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingJob {
    pub owner_id: Uuid,
    pub entry_id: Uuid,
}

/// Handle for scheduling background re-embeds.
#[derive(Clone)]
pub struct EmbeddingQueue {
    tx: mpsc::Sender<EmbeddingJob>,
}

impl EmbeddingQueue {
    /// Starts the worker. It exits once every queue handle is dropped.
    pub fn spawn(
        repo: Arc<dyn JournalRepository>,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<EmbeddingJob>(capacity);

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match index_entry(
                    repo.as_ref(),
                    embedder.as_ref(),
                    vectors.as_ref(),
                    job.owner_id,
                    job.entry_id,
                )
                .await
                {
                    Ok(true) => {}
                    Ok(false) => debug!("Entry {} gone before embedding, skipped", job.entry_id),
                    Err(e) => warn!("Background embedding failed: {e:#}"),
                }
            }
            info!("Embedding worker stopped");
        });

        (Self { tx }, worker)
    }

    /// Never blocks. Returns `false` if the job was dropped.
    pub fn enqueue(&self, owner_id: Uuid, entry_id: Uuid) -> bool {
        match self.tx.try_send(EmbeddingJob { owner_id, entry_id }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("Embedding queue full, dropped job for entry {}", job.entry_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!("Embedding worker stopped, dropped job for entry {}", job.entry_id);
                false
            }
        }
    }

    /// A queue with no worker, for inspecting what handlers schedule.
    #[cfg(test)]
    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<EmbeddingJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}
