use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::guard::rate_limit::RateLimiter;
use crate::guard::topic::TopicGuard;
use crate::journal::repository::JournalRepository;
use crate::llm_client::LanguageModel;
use crate::rag::embedding::Embedder;
use crate::rag::indexer::EmbeddingQueue;
use crate::rag::vector_store::VectorStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn JournalRepository>,
    pub vectors: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LanguageModel>,
    pub sessions: Arc<dyn SessionStore>,
    /// Process-local; constructed once at startup.
    pub rate_limiter: Arc<RateLimiter>,
    pub topic_guard: Arc<TopicGuard>,
    pub indexer: EmbeddingQueue,
    pub config: Arc<Config>,
}
