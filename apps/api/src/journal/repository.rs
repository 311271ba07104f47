use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::journal::{
    DiaryEntry, HerdFacts, HerdGroup, NewEntry, NewHerd, NewPasture, Pasture, PastureFacts,
    Profile, ProfileUpdate, RagEntry, ReviewEntry, WeeklyReview,
};

/// Relational storage for the journal. Every method except `find_entry` is
/// scoped to `owner_id`.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    async fn insert_entry(&self, owner_id: Uuid, entry: &NewEntry) -> sqlx::Result<DiaryEntry>;

    /// `None` when the entry does not exist for this owner.
    async fn update_entry(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        entry: &NewEntry,
    ) -> sqlx::Result<Option<DiaryEntry>>;

    async fn delete_entry(&self, owner_id: Uuid, entry_id: Uuid) -> sqlx::Result<bool>;

    /// Unscoped lookup so callers can tell "missing" from "someone else's".
    async fn find_entry(&self, entry_id: Uuid) -> sqlx::Result<Option<DiaryEntry>>;

    /// The entry joined with its pasture and herd facts.
    async fn rag_entry(&self, owner_id: Uuid, entry_id: Uuid) -> sqlx::Result<Option<RagEntry>>;

    /// Entries dated within `[start, end]`, oldest first.
    async fn entries_between(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> sqlx::Result<Vec<ReviewEntry>>;

    async fn owns_pasture(&self, owner_id: Uuid, pasture_id: Uuid) -> sqlx::Result<bool>;
    async fn owns_herd(&self, owner_id: Uuid, herd_id: Uuid) -> sqlx::Result<bool>;

    async fn insert_pasture(&self, owner_id: Uuid, pasture: &NewPasture) -> sqlx::Result<Pasture>;
    /// `None` when the pasture does not exist for this owner. Otherwise the
    /// ids of entries that were linked to it and now have no pasture.
    async fn delete_pasture(
        &self,
        owner_id: Uuid,
        pasture_id: Uuid,
    ) -> sqlx::Result<Option<Vec<Uuid>>>;

    async fn insert_herd(&self, owner_id: Uuid, herd: &NewHerd) -> sqlx::Result<HerdGroup>;
    /// Same contract as `delete_pasture`, for herd links.
    async fn delete_herd(&self, owner_id: Uuid, herd_id: Uuid)
        -> sqlx::Result<Option<Vec<Uuid>>>;

    async fn update_profile(&self, owner_id: Uuid, update: &ProfileUpdate)
        -> sqlx::Result<Profile>;

    async fn insert_weekly_review(
        &self,
        owner_id: Uuid,
        week_start: NaiveDate,
        week_end: NaiveDate,
        summary_md: &str,
    ) -> sqlx::Result<WeeklyReview>;

    /// Newest first.
    async fn list_weekly_reviews(&self, owner_id: Uuid) -> sqlx::Result<Vec<WeeklyReview>>;
}

#[derive(Clone)]
pub struct PgJournalRepository {
    pool: PgPool,
}

impl PgJournalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RagEntryRow {
    entry_date: NaiveDate,
    content: String,
    tags: Vec<String>,
    pasture_name: Option<String>,
    pasture_acres: Option<f64>,
    herd_name: Option<String>,
    herd_head_count: Option<i32>,
}

impl From<RagEntryRow> for RagEntry {
    fn from(row: RagEntryRow) -> Self {
        RagEntry {
            entry_date: row.entry_date,
            content: row.content,
            pasture: row.pasture_name.map(|name| PastureFacts {
                name,
                acres: row.pasture_acres,
            }),
            herd: row.herd_name.map(|name| HerdFacts {
                name,
                head_count: row.herd_head_count,
            }),
            tags: row.tags,
        }
    }
}

#[async_trait]
impl JournalRepository for PgJournalRepository {
    async fn insert_entry(&self, owner_id: Uuid, entry: &NewEntry) -> sqlx::Result<DiaryEntry> {
        sqlx::query_as::<_, DiaryEntry>(
            r#"
            INSERT INTO diary_entries
                (id, owner_id, entry_date, content, pasture_id, herd_group_id, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(entry.entry_date)
        .bind(&entry.content)
        .bind(entry.pasture_id)
        .bind(entry.herd_group_id)
        .bind(&entry.tags)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_entry(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        entry: &NewEntry,
    ) -> sqlx::Result<Option<DiaryEntry>> {
        sqlx::query_as::<_, DiaryEntry>(
            r#"
            UPDATE diary_entries
               SET entry_date = $3, content = $4, pasture_id = $5,
                   herd_group_id = $6, tags = $7, updated_at = now()
             WHERE id = $1 AND owner_id = $2
            RETURNING *
            "#,
        )
        .bind(entry_id)
        .bind(owner_id)
        .bind(entry.entry_date)
        .bind(&entry.content)
        .bind(entry.pasture_id)
        .bind(entry.herd_group_id)
        .bind(&entry.tags)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_entry(&self, owner_id: Uuid, entry_id: Uuid) -> sqlx::Result<bool> {
        // entry_embeddings cascades on the foreign key.
        let result = sqlx::query("DELETE FROM diary_entries WHERE id = $1 AND owner_id = $2")
            .bind(entry_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_entry(&self, entry_id: Uuid) -> sqlx::Result<Option<DiaryEntry>> {
        sqlx::query_as::<_, DiaryEntry>("SELECT * FROM diary_entries WHERE id = $1")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn rag_entry(&self, owner_id: Uuid, entry_id: Uuid) -> sqlx::Result<Option<RagEntry>> {
        let row = sqlx::query_as::<_, RagEntryRow>(
            r#"
            SELECT e.entry_date, e.content, e.tags,
                   p.name AS pasture_name, p.acres AS pasture_acres,
                   h.name AS herd_name, h.head_count AS herd_head_count
            FROM diary_entries e
            LEFT JOIN pastures p ON p.id = e.pasture_id AND p.owner_id = e.owner_id
            LEFT JOIN herd_groups h ON h.id = e.herd_group_id AND h.owner_id = e.owner_id
            WHERE e.id = $1 AND e.owner_id = $2
            "#,
        )
        .bind(entry_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RagEntry::from))
    }

    async fn entries_between(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> sqlx::Result<Vec<ReviewEntry>> {
        sqlx::query_as::<_, ReviewEntry>(
            r#"
            SELECT e.entry_date, p.name AS pasture_name, e.content
            FROM diary_entries e
            LEFT JOIN pastures p ON p.id = e.pasture_id AND p.owner_id = e.owner_id
            WHERE e.owner_id = $1 AND e.entry_date BETWEEN $2 AND $3
            ORDER BY e.entry_date ASC, e.created_at ASC
            "#,
        )
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
    }

    async fn owns_pasture(&self, owner_id: Uuid, pasture_id: Uuid) -> sqlx::Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pastures WHERE id = $1 AND owner_id = $2)",
        )
        .bind(pasture_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn owns_herd(&self, owner_id: Uuid, herd_id: Uuid) -> sqlx::Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM herd_groups WHERE id = $1 AND owner_id = $2)",
        )
        .bind(herd_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_pasture(&self, owner_id: Uuid, pasture: &NewPasture) -> sqlx::Result<Pasture> {
        sqlx::query_as::<_, Pasture>(
            r#"
            INSERT INTO pastures (id, owner_id, name, acres, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&pasture.name)
        .bind(pasture.acres)
        .bind(&pasture.notes)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_pasture(
        &self,
        owner_id: Uuid,
        pasture_id: Uuid,
    ) -> sqlx::Result<Option<Vec<Uuid>>> {
        let mut tx = self.pool.begin().await?;
        let linked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM diary_entries WHERE pasture_id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(pasture_id)
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM pastures WHERE id = $1 AND owner_id = $2")
            .bind(pasture_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(linked))
    }

    async fn insert_herd(&self, owner_id: Uuid, herd: &NewHerd) -> sqlx::Result<HerdGroup> {
        sqlx::query_as::<_, HerdGroup>(
            r#"
            INSERT INTO herd_groups (id, owner_id, name, head_count, species, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&herd.name)
        .bind(herd.head_count)
        .bind(&herd.species)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_herd(
        &self,
        owner_id: Uuid,
        herd_id: Uuid,
    ) -> sqlx::Result<Option<Vec<Uuid>>> {
        let mut tx = self.pool.begin().await?;
        let linked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM diary_entries WHERE herd_group_id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(herd_id)
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM herd_groups WHERE id = $1 AND owner_id = $2")
            .bind(herd_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(linked))
    }

    async fn update_profile(
        &self,
        owner_id: Uuid,
        update: &ProfileUpdate,
    ) -> sqlx::Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, display_name, ranch_name, timezone, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (id) DO UPDATE
               SET display_name = COALESCE(EXCLUDED.display_name, profiles.display_name),
                   ranch_name = COALESCE(EXCLUDED.ranch_name, profiles.ranch_name),
                   timezone = COALESCE(EXCLUDED.timezone, profiles.timezone),
                   updated_at = now()
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&update.display_name)
        .bind(&update.ranch_name)
        .bind(&update.timezone)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_weekly_review(
        &self,
        owner_id: Uuid,
        week_start: NaiveDate,
        week_end: NaiveDate,
        summary_md: &str,
    ) -> sqlx::Result<WeeklyReview> {
        sqlx::query_as::<_, WeeklyReview>(
            r#"
            INSERT INTO weekly_reviews (id, owner_id, week_start, week_end, summary_md, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(week_start)
        .bind(week_end)
        .bind(summary_md)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_weekly_reviews(&self, owner_id: Uuid) -> sqlx::Result<Vec<WeeklyReview>> {
        sqlx::query_as::<_, WeeklyReview>(
            "SELECT * FROM weekly_reviews WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }
}
