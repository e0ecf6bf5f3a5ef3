//! HTTP surface: axum router and handlers.

pub mod documents;
pub mod error;
pub mod search;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/rag/search", post(search::search))
        .route("/api/rag/documents", get(documents::list_documents))
        .route("/api/rag/documents", post(documents::ingest_document))
        .route("/api/rag/documents/{id}", delete(documents::delete_document))
        .with_state(state)
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "documents": state.documents.read().len(),
        "vectors": state.vectors.entry_count(),
    }))
}
