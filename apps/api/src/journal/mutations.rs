//! Write paths shared by the online endpoints and offline replay, so a
//! replayed operation is validated and applied exactly like its online twin.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::journal::repository::JournalRepository;
use crate::models::journal::{
    normalize_tags, DiaryEntry, EntryTag, HerdGroup, NewEntry, NewHerd, NewPasture, Pasture,
    Profile, ProfileUpdate,
};
use crate::rag::vector_store::VectorStore;

pub const MAX_ENTRY_CHARS: usize = 10_000;
pub const MAX_NAME_CHARS: usize = 120;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    pub entry_date: NaiveDate,
    pub content: String,
    #[serde(default)]
    pub pasture_id: Option<Uuid>,
    #[serde(default)]
    pub herd_group_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<EntryTag>,
}

/// Payload of the delete operations.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletePayload {
    pub id: Uuid,
}

async fn validate_entry(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    input: EntryInput,
) -> Result<NewEntry, AppError> {
    let content = input.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("Entry content is required".into()));
    }
    if content.chars().count() > MAX_ENTRY_CHARS {
        return Err(AppError::Validation(format!(
            "Entry content exceeds {MAX_ENTRY_CHARS} characters"
        )));
    }

    if let Some(pasture_id) = input.pasture_id {
        if !repo.owns_pasture(owner_id, pasture_id).await? {
            return Err(AppError::Validation(format!("Unknown pasture {pasture_id}")));
        }
    }
    if let Some(herd_id) = input.herd_group_id {
        if !repo.owns_herd(owner_id, herd_id).await? {
            return Err(AppError::Validation(format!("Unknown herd group {herd_id}")));
        }
    }

    Ok(NewEntry {
        entry_date: input.entry_date,
        content,
        pasture_id: input.pasture_id,
        herd_group_id: input.herd_group_id,
        tags: normalize_tags(&input.tags),
    })
}

fn validate_name(kind: &str, name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(format!("{kind} name is required")));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "{kind} name exceeds {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn create_entry(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    input: EntryInput,
) -> Result<DiaryEntry, AppError> {
    let entry = validate_entry(repo, owner_id, input).await?;
    Ok(repo.insert_entry(owner_id, &entry).await?)
}

pub async fn update_entry(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    entry_id: Uuid,
    input: EntryInput,
) -> Result<DiaryEntry, AppError> {
    let entry = validate_entry(repo, owner_id, input).await?;
    repo.update_entry(owner_id, entry_id, &entry)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {entry_id} not found")))
}

/// Deletes the entry and its embedding. Returns false if nothing was there.
pub async fn delete_entry(
    repo: &dyn JournalRepository,
    vectors: &dyn VectorStore,
    owner_id: Uuid,
    entry_id: Uuid,
) -> Result<bool, AppError> {
    let deleted = repo.delete_entry(owner_id, entry_id).await?;
    if deleted {
        // Postgres cascades; this covers stores without the foreign key.
        if let Err(e) = vectors.delete(entry_id, owner_id).await {
            warn!("Failed to delete embedding for entry {entry_id}: {e:#}");
        }
    }
    Ok(deleted)
}

pub async fn create_pasture(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    input: NewPasture,
) -> Result<Pasture, AppError> {
    if input.acres.is_some_and(|a| !a.is_finite() || a < 0.0) {
        return Err(AppError::Validation("Acres must be a non-negative number".into()));
    }
    let pasture = NewPasture {
        name: validate_name("Pasture", &input.name)?,
        acres: input.acres,
        notes: trimmed(input.notes),
    };
    Ok(repo.insert_pasture(owner_id, &pasture).await?)
}

/// Returns the entries that lost their pasture link, or `None` if the pasture
/// was not found. Those entries must be re-embedded.
pub async fn delete_pasture(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    pasture_id: Uuid,
) -> Result<Option<Vec<Uuid>>, AppError> {
    Ok(repo.delete_pasture(owner_id, pasture_id).await?)
}

pub async fn create_herd(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    input: NewHerd,
) -> Result<HerdGroup, AppError> {
    if input.head_count.is_some_and(|n| n < 0) {
        return Err(AppError::Validation("Head count cannot be negative".into()));
    }
    let herd = NewHerd {
        name: validate_name("Herd group", &input.name)?,
        head_count: input.head_count,
        species: trimmed(input.species),
    };
    Ok(repo.insert_herd(owner_id, &herd).await?)
}

pub async fn delete_herd(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    herd_id: Uuid,
) -> Result<Option<Vec<Uuid>>, AppError> {
    Ok(repo.delete_herd(owner_id, herd_id).await?)
}

pub async fn update_profile(
    repo: &dyn JournalRepository,
    owner_id: Uuid,
    update: ProfileUpdate,
) -> Result<Profile, AppError> {
    let update = ProfileUpdate {
        display_name: trimmed(update.display_name),
        ranch_name: trimmed(update.ranch_name),
        timezone: trimmed(update.timezone),
    };
    if let Some(name) = &update.display_name {
        validate_name("Display", name)?;
    }
    if let Some(name) = &update.ranch_name {
        validate_name("Ranch", name)?;
    }
    Ok(repo.update_profile(owner_id, &update).await?)
}
