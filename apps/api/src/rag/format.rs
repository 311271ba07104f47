//! Canonical text for diary entries.
//!
//! The same string is embedded and later shown to the model as the entry's
//! ground truth, so it must be a pure function of the entry: fixed line order,
//! no locale-dependent formatting, absent fields omitted rather than blank.

use std::fmt::Write;

use crate::models::journal::RagEntry;

/// Renders an entry as one fact per line:
/// `Date`, `Pasture`, `Herd`, `Tags`, `Notes`, skipping what is absent.
pub fn format_entry_for_rag(entry: &RagEntry) -> String {
    let mut text = format!("Date: {}", entry.entry_date.format("%Y-%m-%d"));

    if let Some(pasture) = &entry.pasture {
        let _ = write!(text, "\nPasture: {}", pasture.name);
        if let Some(acres) = pasture.acres {
            let _ = write!(text, " ({acres} acres)");
        }
    }

    if let Some(herd) = &entry.herd {
        let _ = write!(text, "\nHerd: {}", herd.name);
        if let Some(head) = herd.head_count {
            let _ = write!(text, " ({head} head)");
        }
    }

    if !entry.tags.is_empty() {
        let _ = write!(text, "\nTags: {}", entry.tags.join(", "));
    }

    let _ = write!(text, "\nNotes: {}", entry.content);
    text
}
