//! In-memory stand-ins for the database, providers and sessions, plus a
//! router harness driven through `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::SessionStore;
use crate::config::{Config, RateLimits};
use crate::guard::rate_limit::RateLimiter;
use crate::guard::topic::{TopicGuard, TopicGuardRules};
use crate::journal::mutations::{create_entry, EntryInput};
use crate::journal::repository::JournalRepository;
use crate::llm_client::{ChatMessage, LanguageModel, LlmError, TextStream};
use crate::models::journal::{
    DiaryEntry, HerdFacts, HerdGroup, NewEntry, NewHerd, NewPasture, Pasture, PastureFacts,
    Profile, ProfileUpdate, RagEntry, ReviewEntry, WeeklyReview,
};
use crate::rag::embedding::{Embedder, EmbeddingError};
use crate::rag::indexer::{index_entry, EmbeddingJob, EmbeddingQueue};
use crate::rag::search::RetrievalConfig;
use crate::rag::vector_store::{ScoredPassage, VectorStore};
use crate::routes::build_router;
use crate::state::AppState;

fn fake_db_error(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("fake {what} failure"))
}

// ---------------------------------------------------------------------------
// Embeddings

const FAKE_DIMS: usize = 1024;

/// Hashed bag-of-words vectors: texts sharing words score as similar.
#[derive(Default)]
pub struct FakeEmbedder {
    failing: AtomicBool,
}

impl FakeEmbedder {
    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; FAKE_DIMS];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % FAKE_DIMS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-bow"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Api {
                status: 500,
                message: "fake embedder down".into(),
            });
        }
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// Vector store

#[derive(Debug, Clone)]
struct StoredEmbedding {
    entry_id: Uuid,
    owner_id: Uuid,
    content: String,
    embedding: Vec<f32>,
}

/// Cosine similarity of two vectors. Mismatched lengths or zero vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Same contract as the pgvector query: owner scope, threshold, best first,
/// ties on entry id, at most `limit`.
fn rank_candidates<I>(
    query: &[f32],
    candidates: I,
    owner_id: Option<Uuid>,
    threshold: f32,
    limit: usize,
) -> Vec<ScoredPassage>
where
    I: IntoIterator<Item = StoredEmbedding>,
{
    let mut scored: Vec<ScoredPassage> = candidates
        .into_iter()
        .filter(|c| owner_id.map_or(true, |owner| c.owner_id == owner))
        .filter_map(|c| {
            let similarity = cosine_similarity(query, &c.embedding);
            (similarity.is_finite() && similarity >= threshold).then(|| ScoredPassage {
                entry_id: c.entry_id,
                content: c.content,
                similarity,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });
    scored.truncate(limit);
    scored
}

#[derive(Default)]
pub struct MemoryVectorStore {
    rows: Mutex<HashMap<Uuid, StoredEmbedding>>,
    failing: AtomicBool,
    queries: AtomicUsize,
    last_query: Mutex<Option<(Option<Uuid>, usize)>>,
}

impl MemoryVectorStore {
    pub fn fail_queries(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn content_of(&self, entry_id: Uuid) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&entry_id)
            .map(|r| r.content.clone())
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn last_query_limit(&self) -> Option<usize> {
        self.last_query.lock().unwrap().map(|(_, limit)| limit)
    }

    pub fn last_query_owner(&self) -> Option<Option<Uuid>> {
        self.last_query.lock().unwrap().map(|(owner, _)| owner)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(
        &self,
        entry_id: Uuid,
        owner_id: Uuid,
        content: &str,
        embedding: &[f32],
    ) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.get(&entry_id).is_some_and(|r| r.owner_id != owner_id) {
            return Ok(());
        }
        rows.insert(
            entry_id,
            StoredEmbedding {
                entry_id,
                owner_id,
                content: content.to_string(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete(&self, entry_id: Uuid, owner_id: Uuid) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.get(&entry_id).is_some_and(|r| r.owner_id == owner_id) {
            rows.remove(&entry_id);
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        owner_id: Option<Uuid>,
        threshold: f32,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPassage>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some((owner_id, limit));
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("fake vector store unavailable");
        }
        let rows: Vec<StoredEmbedding> = self.rows.lock().unwrap().values().cloned().collect();
        Ok(rank_candidates(embedding, rows, owner_id, threshold, limit))
    }
}

// ---------------------------------------------------------------------------
// Journal

#[derive(Default)]
struct JournalData {
    entries: HashMap<Uuid, DiaryEntry>,
    pastures: HashMap<Uuid, Pasture>,
    herds: HashMap<Uuid, HerdGroup>,
    profiles: HashMap<Uuid, Profile>,
    reviews: Vec<WeeklyReview>,
}

#[derive(Default)]
pub struct MemoryJournal {
    data: Mutex<JournalData>,
    entry_reads: AtomicUsize,
    failing_review_inserts: AtomicBool,
}

impl MemoryJournal {
    /// Number of calls that read entries back.
    pub fn entry_reads(&self) -> usize {
        self.entry_reads.load(Ordering::SeqCst)
    }

    pub fn fail_review_inserts(&self, on: bool) {
        self.failing_review_inserts.store(on, Ordering::SeqCst);
    }

    pub fn entry_count(&self) -> usize {
        self.data.lock().unwrap().entries.len()
    }

    pub fn entry_ids(&self, owner_id: Uuid) -> Vec<Uuid> {
        self.data
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.id)
            .collect()
    }

    pub fn pasture_count(&self) -> usize {
        self.data.lock().unwrap().pastures.len()
    }

    pub fn herd_count(&self) -> usize {
        self.data.lock().unwrap().herds.len()
    }

    pub fn review_count(&self) -> usize {
        self.data.lock().unwrap().reviews.len()
    }

    pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
        self.data.lock().unwrap().profiles.get(&user_id).cloned()
    }
}

#[async_trait]
impl JournalRepository for MemoryJournal {
    async fn insert_entry(&self, owner_id: Uuid, entry: &NewEntry) -> sqlx::Result<DiaryEntry> {
        let now = Utc::now();
        let row = DiaryEntry {
            id: Uuid::new_v4(),
            owner_id,
            entry_date: entry.entry_date,
            content: entry.content.clone(),
            pasture_id: entry.pasture_id,
            herd_group_id: entry.herd_group_id,
            tags: entry.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        self.data.lock().unwrap().entries.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_entry(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        entry: &NewEntry,
    ) -> sqlx::Result<Option<DiaryEntry>> {
        let mut data = self.data.lock().unwrap();
        let Some(row) = data
            .entries
            .get_mut(&entry_id)
            .filter(|e| e.owner_id == owner_id)
        else {
            return Ok(None);
        };
        row.entry_date = entry.entry_date;
        row.content = entry.content.clone();
        row.pasture_id = entry.pasture_id;
        row.herd_group_id = entry.herd_group_id;
        row.tags = entry.tags.clone();
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_entry(&self, owner_id: Uuid, entry_id: Uuid) -> sqlx::Result<bool> {
        let mut data = self.data.lock().unwrap();
        if data
            .entries
            .get(&entry_id)
            .is_some_and(|e| e.owner_id == owner_id)
        {
            data.entries.remove(&entry_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn find_entry(&self, entry_id: Uuid) -> sqlx::Result<Option<DiaryEntry>> {
        self.entry_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.lock().unwrap().entries.get(&entry_id).cloned())
    }

    async fn rag_entry(&self, owner_id: Uuid, entry_id: Uuid) -> sqlx::Result<Option<RagEntry>> {
        self.entry_reads.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        let Some(entry) = data
            .entries
            .get(&entry_id)
            .filter(|e| e.owner_id == owner_id)
        else {
            return Ok(None);
        };
        let pasture = entry
            .pasture_id
            .and_then(|id| data.pastures.get(&id))
            .map(|p| PastureFacts {
                name: p.name.clone(),
                acres: p.acres,
            });
        let herd = entry
            .herd_group_id
            .and_then(|id| data.herds.get(&id))
            .map(|h| HerdFacts {
                name: h.name.clone(),
                head_count: h.head_count,
            });
        Ok(Some(RagEntry {
            entry_date: entry.entry_date,
            content: entry.content.clone(),
            pasture,
            herd,
            tags: entry.tags.clone(),
        }))
    }

    async fn entries_between(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> sqlx::Result<Vec<ReviewEntry>> {
        self.entry_reads.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        let mut rows: Vec<&DiaryEntry> = data
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && e.entry_date >= start && e.entry_date <= end)
            .collect();
        rows.sort_by_key(|e| (e.entry_date, e.created_at));
        Ok(rows
            .into_iter()
            .map(|e| ReviewEntry {
                entry_date: e.entry_date,
                pasture_name: e
                    .pasture_id
                    .and_then(|id| data.pastures.get(&id))
                    .map(|p| p.name.clone()),
                content: e.content.clone(),
            })
            .collect())
    }

    async fn owns_pasture(&self, owner_id: Uuid, pasture_id: Uuid) -> sqlx::Result<bool> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .pastures
            .get(&pasture_id)
            .is_some_and(|p| p.owner_id == owner_id))
    }

    async fn owns_herd(&self, owner_id: Uuid, herd_id: Uuid) -> sqlx::Result<bool> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .herds
            .get(&herd_id)
            .is_some_and(|h| h.owner_id == owner_id))
    }

    async fn insert_pasture(&self, owner_id: Uuid, pasture: &NewPasture) -> sqlx::Result<Pasture> {
        let row = Pasture {
            id: Uuid::new_v4(),
            owner_id,
            name: pasture.name.clone(),
            acres: pasture.acres,
            notes: pasture.notes.clone(),
            created_at: Utc::now(),
        };
        self.data.lock().unwrap().pastures.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_pasture(
        &self,
        owner_id: Uuid,
        pasture_id: Uuid,
    ) -> sqlx::Result<Option<Vec<Uuid>>> {
        let mut data = self.data.lock().unwrap();
        if !data
            .pastures
            .get(&pasture_id)
            .is_some_and(|row| row.owner_id == owner_id)
        {
            return Ok(None);
        }
        data.pastures.remove(&pasture_id);
        let mut unlinked = Vec::new();
        for entry in data.entries.values_mut() {
            if entry.pasture_id == Some(pasture_id) {
                entry.pasture_id = None;
                unlinked.push(entry.id);
            }
        }
        Ok(Some(unlinked))
    }

    async fn insert_herd(&self, owner_id: Uuid, herd: &NewHerd) -> sqlx::Result<HerdGroup> {
        let row = HerdGroup {
            id: Uuid::new_v4(),
            owner_id,
            name: herd.name.clone(),
            head_count: herd.head_count,
            species: herd.species.clone(),
            created_at: Utc::now(),
        };
        self.data.lock().unwrap().herds.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_herd(
        &self,
        owner_id: Uuid,
        herd_id: Uuid,
    ) -> sqlx::Result<Option<Vec<Uuid>>> {
        let mut data = self.data.lock().unwrap();
        if !data
            .herds
            .get(&herd_id)
            .is_some_and(|row| row.owner_id == owner_id)
        {
            return Ok(None);
        }
        data.herds.remove(&herd_id);
        let mut unlinked = Vec::new();
        for entry in data.entries.values_mut() {
            if entry.herd_group_id == Some(herd_id) {
                entry.herd_group_id = None;
                unlinked.push(entry.id);
            }
        }
        Ok(Some(unlinked))
    }

    async fn update_profile(
        &self,
        owner_id: Uuid,
        update: &ProfileUpdate,
    ) -> sqlx::Result<Profile> {
        let mut data = self.data.lock().unwrap();
        let profile = data.profiles.entry(owner_id).or_insert_with(|| Profile {
            id: owner_id,
            display_name: None,
            ranch_name: None,
            timezone: None,
            updated_at: Utc::now(),
        });
        if let Some(v) = &update.display_name {
            profile.display_name = Some(v.clone());
        }
        if let Some(v) = &update.ranch_name {
            profile.ranch_name = Some(v.clone());
        }
        if let Some(v) = &update.timezone {
            profile.timezone = Some(v.clone());
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn insert_weekly_review(
        &self,
        owner_id: Uuid,
        week_start: NaiveDate,
        week_end: NaiveDate,
        summary_md: &str,
    ) -> sqlx::Result<WeeklyReview> {
        if self.failing_review_inserts.load(Ordering::SeqCst) {
            return Err(fake_db_error("weekly review insert"));
        }
        let row = WeeklyReview {
            id: Uuid::new_v4(),
            owner_id,
            week_start,
            week_end,
            summary_md: summary_md.to_string(),
            created_at: Utc::now(),
        };
        self.data.lock().unwrap().reviews.push(row.clone());
        Ok(row)
    }

    async fn list_weekly_reviews(&self, owner_id: Uuid) -> sqlx::Result<Vec<WeeklyReview>> {
        let mut rows: Vec<WeeklyReview> = self
            .data
            .lock()
            .unwrap()
            .reviews
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Language model

struct RecordedCall {
    system: String,
    messages: Vec<ChatMessage>,
}

pub struct FakeLlm {
    reply: Mutex<Vec<String>>,
    failing: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            reply: Mutex::new(vec!["Noted.".to_string()]),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLlm {
    /// Chunks streamed by `stream_text`; `generate_text` returns them joined.
    pub fn reply_with(&self, chunks: &[&str]) {
        *self.reply.lock().unwrap() = chunks.iter().map(|c| c.to_string()).collect();
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|c| c.system.clone())
    }

    /// Content of the final message in the most recent call.
    pub fn last_user_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .and_then(|c| c.messages.last())
            .map(|m| m.content.clone())
    }

    fn record(&self, system: &str, messages: &[ChatMessage]) -> Result<Vec<String>, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            messages: messages.to_vec(),
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::Api {
                status: 529,
                message: "fake provider overloaded".into(),
            });
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    fn model_name(&self) -> &str {
        "fake-llm"
    }

    async fn generate_text(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        Ok(self.record(system, messages)?.concat())
    }

    async fn stream_text(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, LlmError> {
        let chunks = self.record(system, messages)?;
        let stream: TextStream =
            Box::pin(futures::stream::iter(chunks.into_iter().map(Ok::<_, LlmError>)));
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Sessions

#[derive(Default)]
pub struct MemorySessions {
    tokens: Mutex<HashMap<String, Uuid>>,
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn resolve(&self, token: &str) -> sqlx::Result<Option<Uuid>> {
        Ok(self.tokens.lock().unwrap().get(token).copied())
    }
}

// ---------------------------------------------------------------------------
// Router harness

#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: Uuid,
    pub token: String,
}

pub struct TestApp {
    pub journal: Arc<MemoryJournal>,
    pub vectors: Arc<MemoryVectorStore>,
    pub embedder: Arc<FakeEmbedder>,
    pub llm: Arc<FakeLlm>,
    sessions: Arc<MemorySessions>,
    router: Router,
    scheduled_rx: Mutex<mpsc::Receiver<EmbeddingJob>>,
    scheduled: Mutex<Vec<EmbeddingJob>>,
}

fn test_config(rate_limits: RateLimits) -> Config {
    Config {
        database_url: "postgres://localhost/journal_test".into(),
        anthropic_api_key: "test-anthropic".into(),
        openai_api_key: "test-openai".into(),
        chat_model: "fake-llm".into(),
        embedding_model: "fake-bow".into(),
        rate_limits,
        // Bag-of-words similarity runs lower than real embeddings.
        retrieval: RetrievalConfig {
            threshold: 0.2,
            ..RetrievalConfig::default()
        },
        chat_max_message_chars: 2000,
        port: 0,
        rust_log: "debug".into(),
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limits(RateLimits::default())
    }

    pub fn with_chat_limit(chat_per_hour: u32) -> Self {
        Self::with_limits(RateLimits {
            chat_per_hour,
            ..RateLimits::default()
        })
    }

    pub fn with_embed_limit(embed_per_hour: u32) -> Self {
        Self::with_limits(RateLimits {
            embed_per_hour,
            ..RateLimits::default()
        })
    }

    fn with_limits(rate_limits: RateLimits) -> Self {
        let journal = Arc::new(MemoryJournal::default());
        let vectors = Arc::new(MemoryVectorStore::default());
        let embedder = Arc::new(FakeEmbedder::default());
        let llm = Arc::new(FakeLlm::default());
        let sessions = Arc::new(MemorySessions::default());
        let (indexer, scheduled_rx) = EmbeddingQueue::detached(1024);

        let state = AppState {
            repo: journal.clone(),
            vectors: vectors.clone(),
            embedder: embedder.clone(),
            llm: llm.clone(),
            sessions: sessions.clone(),
            rate_limiter: Arc::new(RateLimiter::new()),
            topic_guard: Arc::new(
                TopicGuard::new(TopicGuardRules::default()).expect("default rules compile"),
            ),
            indexer,
            config: Arc::new(test_config(rate_limits)),
        };

        Self {
            journal,
            vectors,
            embedder,
            llm,
            sessions,
            router: build_router(state),
            scheduled_rx: Mutex::new(scheduled_rx),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Registers a fresh user with a live session.
    pub fn login(&self) -> TestUser {
        let user = TestUser {
            user_id: Uuid::new_v4(),
            token: Uuid::new_v4().simple().to_string(),
        };
        self.sessions
            .tokens
            .lock()
            .unwrap()
            .insert(user.token.clone(), user.user_id);
        user
    }

    /// Inserts an entry directly, bypassing HTTP and the embedding queue.
    pub async fn seed_entry(&self, user: &TestUser, date: &str, content: &str) -> Uuid {
        let input = EntryInput {
            entry_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            content: content.to_string(),
            pasture_id: None,
            herd_group_id: None,
            tags: vec![],
        };
        create_entry(self.journal.as_ref(), user.user_id, input)
            .await
            .unwrap()
            .id
    }

    pub async fn index(&self, user: &TestUser, entry_id: Uuid) {
        let indexed = index_entry(
            self.journal.as_ref(),
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            user.user_id,
            entry_id,
        )
        .await
        .unwrap();
        assert!(indexed);
    }

    /// Jobs the online handlers pushed onto the embedding queue so far.
    pub fn scheduled_embeddings(&self) -> Vec<EmbeddingJob> {
        let mut rx = self.scheduled_rx.lock().unwrap();
        let mut seen = self.scheduled.lock().unwrap();
        while let Ok(job) = rx.try_recv() {
            seen.push(job);
        }
        seen.clone()
    }

    fn request(
        user: Option<&TestUser>,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(user) = user {
            builder = builder.header(header::COOKIE, format!("session={}", user.token));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub async fn post_raw(
        &self,
        user: Option<&TestUser>,
        path: &str,
        body: Value,
    ) -> (StatusCode, HeaderMap, String) {
        let response = self
            .router
            .clone()
            .oneshot(Self::request(user, "POST", path, Some(body)))
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn send(
        &self,
        user: Option<&TestUser>,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(Self::request(user, method, path, body))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn post_json(
        &self,
        user: Option<&TestUser>,
        path: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(user, "POST", path, Some(body)).await
    }
}

/// JSON payloads of every `data:` line in an SSE body.
pub fn sse_payloads(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str(data.trim()).ok())
        .collect()
}

mod tests {
    use super::*;

    fn stored(owner: Uuid, embedding: Vec<f32>, content: &str) -> StoredEmbedding {
        StoredEmbedding {
            entry_id: Uuid::new_v4(),
            owner_id: owner,
            content: content.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_rank_never_crosses_tenants() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let candidates = vec![
            stored(alice, vec![1.0, 0.0], "alice"),
            stored(bob, vec![1.0, 0.0], "bob identical"),
            stored(bob, vec![0.9, 0.1], "bob close"),
        ];

        let results = rank_candidates(&[1.0, 0.0], candidates, Some(alice), 0.0, 10);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "alice");
    }

    #[test]
    fn test_rank_applies_threshold_order_and_limit() {
        let owner = Uuid::new_v4();
        let candidates = vec![
            stored(owner, vec![0.0, 1.0], "orthogonal"),
            stored(owner, vec![0.8, 0.6], "close"),
            stored(owner, vec![1.0, 0.0], "exact"),
            stored(owner, vec![0.6, 0.8], "farther"),
        ];

        let results = rank_candidates(&[1.0, 0.0], candidates.clone(), Some(owner), 0.5, 10);
        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["exact", "close", "farther"]);
        assert!(results.iter().all(|r| r.similarity >= 0.5));

        let limited = rank_candidates(&[1.0, 0.0], candidates, Some(owner), 0.5, 2);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_rank_skips_mismatched_dimensions() {
        let owner = Uuid::new_v4();
        let candidates = vec![stored(owner, vec![1.0, 0.0, 0.0], "other model")];
        assert!(rank_candidates(&[1.0, 0.0], candidates, Some(owner), 0.1, 5).is_empty());
    }

    #[test]
    fn test_rank_unscoped_sees_all_owners() {
        let candidates = vec![
            stored(Uuid::new_v4(), vec![1.0, 0.0], "a"),
            stored(Uuid::new_v4(), vec![1.0, 0.0], "b"),
        ];
        assert_eq!(rank_candidates(&[1.0, 0.0], candidates, None, 0.9, 5).len(), 2);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
