mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod guard;
mod journal;
mod llm_client;
mod models;
mod rag;
mod review;
mod routes;
mod state;
mod sync;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::PgSessionStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::guard::rate_limit::{RateLimiter, DEFAULT_WINDOW};
use crate::guard::topic::{TopicGuard, TopicGuardRules};
use crate::journal::repository::PgJournalRepository;
use crate::llm_client::AnthropicClient;
use crate::rag::embedding::OpenAiEmbedder;
use crate::rag::indexer::{EmbeddingQueue, DEFAULT_QUEUE_CAPACITY};
use crate::rag::vector_store::PgVectorStore;
use crate::routes::build_router;
use crate::state::AppState;

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting journal API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;
    let repo = Arc::new(PgJournalRepository::new(db.clone()));
    let vectors = Arc::new(PgVectorStore::new(db.clone(), config.embedding_model.clone()));
    let sessions = Arc::new(PgSessionStore::new(db));

    let embedder = Arc::new(OpenAiEmbedder::new(
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
    )?);
    info!("Embedding client initialized (model: {})", config.embedding_model);

    let llm = Arc::new(AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.chat_model.clone(),
    )?);
    info!("LLM client initialized (model: {})", config.chat_model);

    let (indexer, _worker) = EmbeddingQueue::spawn(
        repo.clone(),
        embedder.clone(),
        vectors.clone(),
        DEFAULT_QUEUE_CAPACITY,
    );

    let rate_limiter = Arc::new(RateLimiter::new());
    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.prune_idle(DEFAULT_WINDOW);
            if removed > 0 {
                debug!("Pruned {removed} idle rate limit windows");
            }
        }
    });

    info!(
        "Rate limits per hour: chat={} weekly_review={} embed={}",
        config.rate_limits.chat_per_hour,
        config.rate_limits.weekly_review_per_hour,
        config.rate_limits.embed_per_hour
    );

    let state = AppState {
        repo,
        vectors,
        embedder,
        llm,
        sessions,
        rate_limiter,
        topic_guard: Arc::new(TopicGuard::new(TopicGuardRules::default())?),
        indexer,
        config: Arc::new(config.clone()),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
