use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::guard::{admit, rate_limit::EMBED_ENDPOINT};
use crate::rag::indexer::index_entry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedRequest {
    pub entry_id: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub success: bool,
}

/// POST /api/embed
pub async fn handle_embed(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, AppError> {
    let Json(req) = payload?;
    let entry_id = Uuid::parse_str(req.entry_id.trim())
        .map_err(|_| AppError::Validation("entryId must be a UUID".into()))?;

    admit(
        &state.rate_limiter,
        auth.user_id,
        EMBED_ENDPOINT,
        state.config.rate_limits.embed_per_hour,
    )?;

    let entry = state
        .repo
        .find_entry(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {entry_id} not found")))?;
    if entry.owner_id != auth.user_id {
        return Err(AppError::Forbidden);
    }

    let indexed = index_entry(
        state.repo.as_ref(),
        state.embedder.as_ref(),
        state.vectors.as_ref(),
        auth.user_id,
        entry_id,
    )
    .await?;
    if !indexed {
        // Deleted between the ownership check and the load.
        return Err(AppError::NotFound(format!("Entry {entry_id} not found")));
    }

    Ok(Json(EmbedResponse { success: true }))
}
