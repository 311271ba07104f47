use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::guard::{admit, rate_limit::WEEKLY_REVIEW_ENDPOINT};
use crate::llm_client::generate_structured;
use crate::models::journal::WeeklyReview;
use crate::rag::compose::compose_week_entries;
use crate::review::prompts::{weekly_review_prompt, WEEKLY_REVIEW_SYSTEM};
use crate::review::range::resolve_range;
use crate::state::AppState;

pub const MIN_REVIEW_ENTRIES: usize = 2;
pub const NOT_ENOUGH_ENTRIES_MESSAGE: &str =
    "Not enough diary entries this week to write a review. Add at least two entries and try again.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReviewRequest {
    #[serde(default)]
    pub week_start: Option<String>,
    #[serde(default)]
    pub week_end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WeeklyReviewResponse {
    pub summary_md: String,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<WeeklyReview>,
}

/// Shape the model is asked to return.
#[derive(Debug, Deserialize)]
struct WeeklyReviewDraft {
    summary_md: String,
}

/// POST /api/weekly-review
pub async fn handle_weekly_review(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<WeeklyReviewRequest>, JsonRejection>,
) -> Result<Json<WeeklyReviewResponse>, AppError> {
    let Json(req) = payload?;
    let (week_start, week_end) = resolve_range(
        req.week_start.as_deref(),
        req.week_end.as_deref(),
        Utc::now().date_naive(),
    )?;

    admit(
        &state.rate_limiter,
        auth.user_id,
        WEEKLY_REVIEW_ENDPOINT,
        state.config.rate_limits.weekly_review_per_hour,
    )?;

    let entries = state
        .repo
        .entries_between(auth.user_id, week_start, week_end)
        .await?;
    if entries.len() < MIN_REVIEW_ENTRIES {
        info!(
            "Weekly review skipped for user {}: {} entries in {week_start}..{week_end}",
            auth.user_id,
            entries.len()
        );
        return Ok(Json(WeeklyReviewResponse {
            summary_md: NOT_ENOUGH_ENTRIES_MESSAGE.to_string(),
            saved: false,
            review: None,
        }));
    }

    let prompt = weekly_review_prompt(
        &week_start.format("%Y-%m-%d").to_string(),
        &week_end.format("%Y-%m-%d").to_string(),
        &compose_week_entries(&entries),
    );
    let draft: WeeklyReviewDraft =
        generate_structured(state.llm.as_ref(), WEEKLY_REVIEW_SYSTEM, &prompt)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;
    let summary_md = draft.summary_md.trim().to_string();
    if summary_md.is_empty() {
        return Err(AppError::Llm("model returned an empty summary".into()));
    }

    match state
        .repo
        .insert_weekly_review(auth.user_id, week_start, week_end, &summary_md)
        .await
    {
        Ok(review) => Ok(Json(WeeklyReviewResponse {
            summary_md,
            saved: true,
            review: Some(review),
        })),
        Err(e) => {
            error!("Failed to save weekly review for user {}: {e}", auth.user_id);
            Ok(Json(WeeklyReviewResponse {
                summary_md,
                saved: false,
                review: None,
            }))
        }
    }
}

/// GET /api/weekly-review
pub async fn handle_list_weekly_reviews(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<WeeklyReview>>, AppError> {
    Ok(Json(state.repo.list_weekly_reviews(auth.user_id).await?))
}
