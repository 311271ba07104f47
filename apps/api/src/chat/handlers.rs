use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::auth::AuthUser;
use crate::chat::conversation::{last_user_utterance, normalize_conversation};
use crate::chat::prompts::chat_system_prompt;
use crate::errors::AppError;
use crate::guard::{admit, rate_limit::CHAT_ENDPOINT};
use crate::llm_client::TextStream;
use crate::rag::compose::compose_passages;
use crate::rag::search::{adaptive_top_k, search_diary_entries};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Raw client history; normalized before use.
    pub messages: Vec<Value>,
}

const STREAM_FAILED_MESSAGE: &str = "The response was interrupted. Please try again.";

/// POST /api/chat
///
/// Streams `{"type":"text","text":...}` events, then `{"type":"done"}`.
/// A failure after streaming has begun ends with `{"type":"error",...}`.
pub async fn handle_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Json(req) = payload?;

    admit(
        &state.rate_limiter,
        auth.user_id,
        CHAT_ENDPOINT,
        state.config.rate_limits.chat_per_hour,
    )?;

    let messages = normalize_conversation(&req.messages);
    let question = last_user_utterance(&messages)
        .ok_or_else(|| AppError::Validation("No user message found".into()))?;
    if question.chars().count() > state.config.chat_max_message_chars {
        return Err(AppError::Validation(format!(
            "Message exceeds {} characters",
            state.config.chat_max_message_chars
        )));
    }

    let verdict = state.topic_guard.check(question);
    if !verdict.allowed {
        info!("Topic guard declined a chat message from user {}", auth.user_id);
        return Err(AppError::OffTopic(verdict.reason.unwrap_or_default()));
    }

    let retrieval = &state.config.retrieval;
    let top_k = adaptive_top_k(question, retrieval);
    let passages = match search_diary_entries(
        state.embedder.as_ref(),
        state.vectors.as_ref(),
        question,
        top_k,
        retrieval.threshold,
        Some(auth.user_id),
    )
    .await
    {
        Ok(passages) => passages,
        Err(e) => {
            warn!("Retrieval failed for user {}, answering without context: {e:#}", auth.user_id);
            Vec::new()
        }
    };

    let system = chat_system_prompt(&compose_passages(&passages), Utc::now().date_naive());
    let stream = state
        .llm
        .stream_text(&system, &messages)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Sse::new(sse_events(stream)).keep_alive(KeepAlive::default()))
}

fn data_event(payload: Value) -> Result<Event, Infallible> {
    Ok(Event::default().data(payload.to_string()))
}

/// Forwards model text as SSE events and always terminates with a done or
/// error event. Dropping the response drops the upstream stream with it.
fn sse_events(stream: TextStream) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(Some(stream), |state| async move {
        let mut stream = state?;
        match stream.next().await {
            Some(Ok(text)) => Some((data_event(json!({ "type": "text", "text": text })), Some(stream))),
            Some(Err(e)) => {
                error!("Chat stream failed mid-response: {e}");
                Some((
                    data_event(json!({ "type": "error", "error": STREAM_FAILED_MESSAGE })),
                    None,
                ))
            }
            None => Some((data_event(json!({ "type": "done" })), None)),
        }
    })
}
