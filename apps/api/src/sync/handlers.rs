//! Server-side replay of offline operations.
//!
//! Each operation is applied independently through the same mutation code as
//! its online endpoint. One failure never aborts the batch; its error string
//! goes back to the client, which keeps the operation queued.
//!
//! Entries a replay creates or unlinks are pushed straight onto the embedding
//! queue; replay never goes through the rate-limited embed endpoint.
//!
//! Replay does not deduplicate on the client operation id, so a create that
//! was applied but whose response never reached the client is applied again
//! on the next flush.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use field_sync::{OfflineOperation, OperationKind, OperationResult, SyncResponse, MAX_SYNC_BATCH};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::journal::mutations::{self, DeletePayload, EntryInput};
use crate::models::journal::{NewHerd, NewPasture, ProfileUpdate};
use crate::state::AppState;

/// Operations stay as raw JSON so one malformed operation fails alone.
#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub operations: Vec<Value>,
}

fn payload<T: DeserializeOwned>(op: &OfflineOperation) -> Result<T, AppError> {
    serde_json::from_value(op.payload.clone()).map_err(|e| {
        AppError::Validation(format!("Invalid {} payload: {e}", op.kind.as_str()))
    })
}

/// Applies one operation for `owner_id`. Returns the entries whose embedding
/// is now stale: the new entry for `create_entry`, the unlinked entries for
/// the deletes. Deleting something already gone counts as success.
pub async fn apply_operation(
    state: &AppState,
    owner_id: Uuid,
    op: &OfflineOperation,
) -> Result<Vec<Uuid>, AppError> {
    let repo = state.repo.as_ref();
    match op.kind {
        OperationKind::CreateEntry => {
            let input: EntryInput = payload(op)?;
            let entry = mutations::create_entry(repo, owner_id, input).await?;
            return Ok(vec![entry.id]);
        }
        OperationKind::CreatePasture => {
            let input: NewPasture = payload(op)?;
            mutations::create_pasture(repo, owner_id, input).await?;
        }
        OperationKind::DeletePasture => {
            let DeletePayload { id } = payload(op)?;
            match mutations::delete_pasture(repo, owner_id, id).await? {
                Some(unlinked) => return Ok(unlinked),
                None => debug!("Replayed delete_pasture for missing pasture {id}"),
            }
        }
        OperationKind::CreateHerd => {
            let input: NewHerd = payload(op)?;
            mutations::create_herd(repo, owner_id, input).await?;
        }
        OperationKind::DeleteHerd => {
            let DeletePayload { id } = payload(op)?;
            match mutations::delete_herd(repo, owner_id, id).await? {
                Some(unlinked) => return Ok(unlinked),
                None => debug!("Replayed delete_herd for missing herd {id}"),
            }
        }
        OperationKind::UpdateProfile => {
            let update: ProfileUpdate = payload(op)?;
            mutations::update_profile(repo, owner_id, update).await?;
        }
    }
    Ok(Vec::new())
}

/// POST /api/sync
pub async fn handle_sync(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, AppError> {
    let Json(req) = payload?;
    if req.operations.is_empty() {
        return Err(AppError::Validation("No operations to sync".into()));
    }
    if req.operations.len() > MAX_SYNC_BATCH {
        return Err(AppError::Validation(format!(
            "Too many operations: {} (max {MAX_SYNC_BATCH})",
            req.operations.len()
        )));
    }

    let mut results = Vec::with_capacity(req.operations.len());
    for raw in req.operations {
        let fallback_id = raw
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let op: OfflineOperation = match serde_json::from_value(raw) {
            Ok(op) => op,
            Err(e) => {
                warn!("Rejected malformed offline operation {fallback_id:?}: {e}");
                results.push(OperationResult::failed(fallback_id, "Malformed operation"));
                continue;
            }
        };

        match apply_operation(&state, auth.user_id, &op).await {
            Ok(stale) => {
                for entry_id in stale {
                    state.indexer.enqueue(auth.user_id, entry_id);
                }
                results.push(OperationResult::ok(op.id));
            }
            Err(e) => {
                warn!(
                    "Replay of {} operation {} failed for user {}: {e}",
                    op.kind.as_str(),
                    op.id,
                    auth.user_id
                );
                results.push(OperationResult::failed(op.id, e.public_message()));
            }
        }
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    info!(
        "Replayed {} offline operations for user {} ({succeeded} succeeded)",
        results.len(),
        auth.user_id
    );
    Ok(Json(SyncResponse { results }))
}
