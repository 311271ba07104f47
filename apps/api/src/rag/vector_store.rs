//! One embedding per diary entry, queried by cosine similarity within a
//! single owner's rows.

use std::fmt::Write;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A retrieved entry with its canonical text and similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ScoredPassage {
    pub entry_id: Uuid,
    pub content: String,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces the embedding for `entry_id`. Last write wins.
    async fn upsert(
        &self,
        entry_id: Uuid,
        owner_id: Uuid,
        content: &str,
        embedding: &[f32],
    ) -> Result<()>;

    async fn delete(&self, entry_id: Uuid, owner_id: Uuid) -> Result<()>;

    /// Nearest entries at or above `threshold`, best first, at most `limit`.
    /// `owner_id = None` searches every tenant and is reserved for
    /// maintenance tooling.
    async fn query(
        &self,
        embedding: &[f32],
        owner_id: Option<Uuid>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredPassage>>;
}

/// Renders a vector in pgvector's text form, `[0.1,0.2]`, for a
/// `$n::text::vector` cast.
fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value}");
    }
    out.push(']');
    out
}

/// Postgres-backed store on pgvector. Scoring, threshold, ordering and limit
/// all run in SQL; `<=>` is cosine distance, so similarity is `1 - distance`.
/// A zero vector yields a NaN distance, which Postgres orders above any
/// bound, so it never passes the distance filter. Rows are filtered to the
/// store's model, so every compared vector has the query's dimensions.
#[derive(Clone)]
pub struct PgVectorStore {
    pool: PgPool,
    model: String,
}

impl PgVectorStore {
    pub fn new(pool: PgPool, model: String) -> Self {
        Self { pool, model }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn upsert(
        &self,
        entry_id: Uuid,
        owner_id: Uuid,
        content: &str,
        embedding: &[f32],
    ) -> Result<()> {
        // Single statement: readers see the old row or the new one, never a mix.
        // The owner guard keeps a stray job from re-homing another tenant's row.
        sqlx::query(
            r#"
            INSERT INTO entry_embeddings (entry_id, owner_id, content, embedding, model, updated_at)
            VALUES ($1, $2, $3, $4::text::vector, $5, now())
            ON CONFLICT (entry_id) DO UPDATE
               SET content = EXCLUDED.content,
                   embedding = EXCLUDED.embedding,
                   model = EXCLUDED.model,
                   updated_at = now()
             WHERE entry_embeddings.owner_id = EXCLUDED.owner_id
            "#,
        )
        .bind(entry_id)
        .bind(owner_id)
        .bind(content)
        .bind(vector_literal(embedding))
        .bind(&self.model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, entry_id: Uuid, owner_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM entry_embeddings WHERE entry_id = $1 AND owner_id = $2")
            .bind(entry_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        owner_id: Option<Uuid>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let max_distance = 1.0 - f64::from(threshold);
        let passages = sqlx::query_as::<_, ScoredPassage>(
            r#"
            SELECT entry_id, content, (1 - (embedding <=> $1::text::vector))::real AS similarity
            FROM entry_embeddings
            WHERE ($2::uuid IS NULL OR owner_id = $2)
              AND model = $3
              AND (embedding <=> $1::text::vector) <= $4
            ORDER BY embedding <=> $1::text::vector, entry_id
            LIMIT $5
            "#,
        )
        .bind(vector_literal(embedding))
        .bind(owner_id)
        .bind(&self.model)
        .bind(max_distance)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(passages)
    }
}
