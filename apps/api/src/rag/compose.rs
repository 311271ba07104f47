//! Prompt context built from diary material.

use crate::models::journal::ReviewEntry;
use crate::rag::vector_store::ScoredPassage;

/// Substituted when retrieval found nothing, so templates always get a value.
pub const NO_ENTRIES_SENTINEL: &str = "No relevant diary entries found.";

const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Labels each passage `[Entry #i]` with its similarity, keeping retrieval
/// order.
pub fn compose_passages(passages: &[ScoredPassage]) -> String {
    if passages.is_empty() {
        return NO_ENTRIES_SENTINEL.to_string();
    }

    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[Entry #{}] (similarity: {:.2})\n{}",
                i + 1,
                p.similarity,
                p.content
            )
        })
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

/// One `[date] pasture-or-General: content` line per entry, oldest first.
pub fn compose_week_entries(entries: &[ReviewEntry]) -> String {
    let mut ordered: Vec<&ReviewEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.entry_date);

    ordered
        .iter()
        .map(|e| {
            format!(
                "[{}] {}: {}",
                e.entry_date.format("%Y-%m-%d"),
                e.pasture_name.as_deref().unwrap_or("General"),
                e.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
