use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::journal::mutations::{self, EntryInput};
use crate::models::journal::{DiaryEntry, HerdGroup, NewHerd, NewPasture, Pasture, Profile, ProfileUpdate};
use crate::state::AppState;

/// POST /api/entries
pub async fn handle_create_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<EntryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<DiaryEntry>), AppError> {
    let Json(input) = payload?;
    let entry = mutations::create_entry(state.repo.as_ref(), auth.user_id, input).await?;
    state.indexer.enqueue(auth.user_id, entry.id);
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /api/entries/:id
pub async fn handle_update_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<EntryInput>, JsonRejection>,
) -> Result<Json<DiaryEntry>, AppError> {
    let Json(input) = payload?;
    let entry = mutations::update_entry(state.repo.as_ref(), auth.user_id, id, input).await?;
    state.indexer.enqueue(auth.user_id, entry.id);
    Ok(Json(entry))
}

/// DELETE /api/entries/:id
pub async fn handle_delete_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted =
        mutations::delete_entry(state.repo.as_ref(), state.vectors.as_ref(), auth.user_id, id)
            .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Entry {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/pastures
pub async fn handle_create_pasture(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<NewPasture>, JsonRejection>,
) -> Result<(StatusCode, Json<Pasture>), AppError> {
    let Json(input) = payload?;
    let pasture = mutations::create_pasture(state.repo.as_ref(), auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(pasture)))
}

/// DELETE /api/pastures/:id
pub async fn handle_delete_pasture(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let Some(unlinked) = mutations::delete_pasture(state.repo.as_ref(), auth.user_id, id).await?
    else {
        return Err(AppError::NotFound(format!("Pasture {id} not found")));
    };
    for entry_id in unlinked {
        state.indexer.enqueue(auth.user_id, entry_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/herds
pub async fn handle_create_herd(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<NewHerd>, JsonRejection>,
) -> Result<(StatusCode, Json<HerdGroup>), AppError> {
    let Json(input) = payload?;
    let herd = mutations::create_herd(state.repo.as_ref(), auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(herd)))
}

/// DELETE /api/herds/:id
pub async fn handle_delete_herd(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let Some(unlinked) = mutations::delete_herd(state.repo.as_ref(), auth.user_id, id).await?
    else {
        return Err(AppError::NotFound(format!("Herd group {id} not found")));
    };
    for entry_id in unlinked {
        state.indexer.enqueue(auth.user_id, entry_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Profile>, AppError> {
    let Json(update) = payload?;
    let profile = mutations::update_profile(state.repo.as_ref(), auth.user_id, update).await?;
    Ok(Json(profile))
}
