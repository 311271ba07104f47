//! Retrieval orchestration: embed the question, pick how much evidence to
//! pull, and query the owner's vectors.

use anyhow::{Context, Result};
use tracing::debug;
use uuid::Uuid;

use crate::rag::embedding::Embedder;
use crate::rag::vector_store::{ScoredPassage, VectorStore};

pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_TREND_TOP_K: usize = 12;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.72;

/// Phrases that mark a question as asking about change over time.
/// Tunable heuristic, not a classifier.
pub const DEFAULT_TREND_KEYWORDS: &[&str] = &[
    "trend",
    "trends",
    "ever",
    "history",
    "historically",
    "pattern",
    "patterns",
    "compare",
    "compared",
    "comparison",
    "always",
    "usually",
    "typically",
    "over time",
    "how often",
    "every year",
    "last year",
    "past year",
    "each season",
];

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub base_top_k: usize,
    pub trend_top_k: usize,
    pub threshold: f32,
    pub trend_keywords: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_top_k: DEFAULT_TOP_K,
            trend_top_k: DEFAULT_TREND_TOP_K,
            threshold: DEFAULT_MATCH_THRESHOLD,
            trend_keywords: DEFAULT_TREND_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when any keyword appears as a whole word or whole-word phrase,
/// so "ever" matches "has it ever flooded" but not "every" or "several".
pub fn is_trend_question(question: &str, keywords: &[String]) -> bool {
    let tokens = words(question);
    keywords.iter().any(|keyword| {
        let phrase = words(keyword);
        !phrase.is_empty() && tokens.windows(phrase.len()).any(|w| w == phrase.as_slice())
    })
}

/// Result count for a question: broader for trend questions.
pub fn adaptive_top_k(question: &str, config: &RetrievalConfig) -> usize {
    if is_trend_question(question, &config.trend_keywords) {
        config.trend_top_k
    } else {
        config.base_top_k
    }
}

/// Embeds `question` and returns the closest passages above `threshold`.
///
/// User-facing callers must pass `owner_id`. An empty result is not an error;
/// embedding and store failures are.
pub async fn search_diary_entries(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    question: &str,
    top_k: usize,
    threshold: f32,
    owner_id: Option<Uuid>,
) -> Result<Vec<ScoredPassage>> {
    if question.trim().is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embedder
        .embed(question)
        .await
        .context("failed to embed search question")?;

    let passages = store
        .query(&query_vec, owner_id, threshold, top_k)
        .await
        .context("vector store query failed")?;

    debug!(
        "Retrieved {} passages (top_k={top_k}, threshold={threshold})",
        passages.len()
    );
    Ok(passages)
}
