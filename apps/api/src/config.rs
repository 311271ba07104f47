use std::str::FromStr;

use anyhow::{Context, Result};

use crate::rag::search::RetrievalConfig;

/// Per-hour quotas for the AI-backed endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub chat_per_hour: u32,
    pub weekly_review_per_hour: u32,
    pub embed_per_hour: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            chat_per_hour: 30,
            weekly_review_per_hour: 5,
            embed_per_hour: 120,
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub rate_limits: RateLimits,
    pub retrieval: RetrievalConfig,
    pub chat_max_message_chars: usize,
    pub port: u16,
    pub rust_log: String,
}

pub const DEFAULT_CHAT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MAX_MESSAGE_CHARS: usize = 2000;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let port: u16 = env_or("PORT", 8080)?;
        let defaults = RetrievalConfig::default();
        let limits = RateLimits::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            chat_model: std::env::var("CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            rate_limits: RateLimits {
                chat_per_hour: env_or("CHAT_RATE_LIMIT_PER_HOUR", limits.chat_per_hour)?,
                weekly_review_per_hour: env_or(
                    "WEEKLY_REVIEW_RATE_LIMIT_PER_HOUR",
                    limits.weekly_review_per_hour,
                )?,
                embed_per_hour: env_or("EMBED_RATE_LIMIT_PER_HOUR", limits.embed_per_hour)?,
            },
            retrieval: RetrievalConfig {
                threshold: env_or("RAG_MATCH_THRESHOLD", defaults.threshold)?,
                base_top_k: env_or("RAG_BASE_TOP_K", defaults.base_top_k)?,
                trend_top_k: env_or("RAG_TREND_TOP_K", defaults.trend_top_k)?,
                ..defaults
            },
            chat_max_message_chars: env_or(
                "CHAT_MAX_MESSAGE_CHARS",
                DEFAULT_CHAT_MAX_MESSAGE_CHARS,
            )?,
            port,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
