use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Category tags an entry can carry. Stored as their snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTag {
    Grazing,
    HerdHealth,
    Weather,
    Water,
    Fencing,
    Feed,
    Breeding,
    Equipment,
    Soil,
    Other,
}

impl EntryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryTag::Grazing => "grazing",
            EntryTag::HerdHealth => "herd_health",
            EntryTag::Weather => "weather",
            EntryTag::Water => "water",
            EntryTag::Fencing => "fencing",
            EntryTag::Feed => "feed",
            EntryTag::Breeding => "breeding",
            EntryTag::Equipment => "equipment",
            EntryTag::Soil => "soil",
            EntryTag::Other => "other",
        }
    }
}

/// Sorts and deduplicates a tag set so storage and canonical text are stable.
pub fn normalize_tags(tags: &[EntryTag]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort();
    tags.dedup();
    tags.iter().map(|t| t.as_str().to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub entry_date: NaiveDate,
    pub content: String,
    pub pasture_id: Option<Uuid>,
    pub herd_group_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pasture {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub acres: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HerdGroup {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub head_count: Option<i32>,
    pub species: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted weekly summary. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeeklyReview {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub summary_md: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub ranch_name: Option<String>,
    pub timezone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// An entry joined with the pasture/herd facts the canonical text needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RagEntry {
    pub entry_date: NaiveDate,
    pub content: String,
    pub pasture: Option<PastureFacts>,
    pub herd: Option<HerdFacts>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PastureFacts {
    pub name: String,
    pub acres: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HerdFacts {
    pub name: String,
    pub head_count: Option<i32>,
}

/// The slice of an entry the weekly review prompt uses.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReviewEntry {
    pub entry_date: NaiveDate,
    pub pasture_name: Option<String>,
    pub content: String,
}

/// A validated entry write: tags already normalized, links already checked.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub entry_date: NaiveDate,
    pub content: String,
    pub pasture_id: Option<Uuid>,
    pub herd_group_id: Option<Uuid>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPasture {
    pub name: String,
    #[serde(default)]
    pub acres: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHerd {
    pub name: String,
    #[serde(default)]
    pub head_count: Option<i32>,
    #[serde(default)]
    pub species: Option<String>,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub ranch_name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}
