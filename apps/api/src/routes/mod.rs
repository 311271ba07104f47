pub mod health;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::chat::handlers::handle_chat;
use crate::journal::handlers as journal;
use crate::rag::handlers::handle_embed;
use crate::review::handlers::{handle_list_weekly_reviews, handle_weekly_review};
use crate::state::AppState;
use crate::sync::handlers::handle_sync;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // AI-backed endpoints
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/weekly-review",
            post(handle_weekly_review).get(handle_list_weekly_reviews),
        )
        .route("/api/embed", post(handle_embed))
        // Offline replay
        .route("/api/sync", post(handle_sync))
        // Journal CRUD
        .route("/api/entries", post(journal::handle_create_entry))
        .route(
            "/api/entries/:id",
            put(journal::handle_update_entry).delete(journal::handle_delete_entry),
        )
        .route("/api/pastures", post(journal::handle_create_pasture))
        .route("/api/pastures/:id", delete(journal::handle_delete_pasture))
        .route("/api/herds", post(journal::handle_create_herd))
        .route("/api/herds/:id", delete(journal::handle_delete_herd))
        .route("/api/profile", patch(journal::handle_update_profile))
        .with_state(state)
}
