use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::OwnedSemaphorePermit;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::llm::embeddings::embed_batch;
use crate::models::{Chunk, Document, IngestDocumentRequest};
use crate::state::AppState;

/// GET /api/rag/documents - List registered documents
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.documents.read().clone())
}

/// POST /api/rag/documents - Embed and index a pre-chunked document.
///
/// A document id that is already registered is replaced. Chunk ids must be
/// unique within the request and may not belong to another document.
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(req): Json<IngestDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let document_id = match req.document_id.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::BadRequest("document_id must not be empty".to_string())),
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let chunks: Vec<Chunk> = req
        .chunks
        .into_iter()
        .filter(|c| !c.content.trim().is_empty())
        .map(|c| Chunk {
            chunk_id: c
                .chunk_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            document_id: document_id.clone(),
            document_title: title.clone(),
            content: c.content,
            metadata: c.metadata,
        })
        .collect();

    if chunks.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one non-empty chunk is required".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(chunks.len());
    if let Some(dup) = chunks.iter().find(|c| !seen.insert(c.chunk_id.as_str())) {
        return Err(ApiError::BadRequest(format!(
            "Duplicate chunk_id {} in request",
            dup.chunk_id
        )));
    }

    // ── Acquire write permit ──────────────────────────────
    let _permit = write_permit(&state).await?;

    let chunk_ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    if let Some((chunk_id, owner)) = state
        .vectors
        .chunks_owned_elsewhere(&document_id, &chunk_ids)
        .first()
    {
        return Err(ApiError::BadRequest(format!(
            "chunk_id {chunk_id} already belongs to document {owner}"
        )));
    }

    state
        .vectors
        .ensure_room_for(&document_id, chunks.len())
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;

    // ── Embed ─────────────────────────────────────────────
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embed_batch(&state.http_client, &state.config.llm, &texts)
        .await
        .map_err(|e| {
            tracing::error!("Failed to embed document {document_id}: {e:#}");
            ApiError::Embedding(format!("{e:#}"))
        })?;

    // ── Replace in both stores ────────────────────────────
    if let Err(e) = state.vectors.replace_document(&document_id, &chunks, embeddings) {
        discard_document(&state, &document_id).await;
        return Err(ApiError::internal("Failed to store embeddings", format!("{e:#}")));
    }

    let keyword = state.keyword.clone();
    let to_index = chunks.clone();
    let id = document_id.clone();
    let indexed = tokio::task::spawn_blocking(move || keyword.replace_document(&id, &to_index))
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r.map_err(|e| format!("{e:#}")));
    if let Err(e) = indexed {
        discard_document(&state, &document_id).await;
        return Err(ApiError::internal("Failed to index document", e));
    }

    let document = Document {
        id: document_id.clone(),
        title,
        chunk_count: chunks.len(),
        indexed_at: Utc::now(),
    };

    {
        let mut documents = state.documents.write();
        documents.retain(|d| d.id != document_id);
        documents.push(document.clone());
        drop(documents);
        state.persist_documents();
    }

    tracing::info!("Indexed document {document_id} with {} chunks", document.chunk_count);
    Ok((StatusCode::CREATED, Json(document)))
}

/// DELETE /api/rag/documents/{id} - Remove a document and its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let _permit = write_permit(&state).await?;

    let exists = state.documents.read().iter().any(|d| d.id == id);
    if !exists {
        return Err(ApiError::NotFound(format!("Document {id} not found")));
    }

    remove_from_stores(&state, &id).await?;
    unregister(&state, &id);

    tracing::info!("Deleted document {id}");
    Ok(StatusCode::NO_CONTENT)
}

async fn write_permit(state: &AppState) -> Result<OwnedSemaphorePermit, ApiError> {
    state
        .write_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ApiError::internal("Document writes are unavailable", e))
}

/// Remove every trace of a document after a replace failed part way.
async fn discard_document(state: &AppState, document_id: &str) {
    tracing::warn!("Discarding document {document_id} after a failed ingest");
    if let Err(e) = remove_from_stores(state, document_id).await {
        tracing::error!("Failed to clean up document {document_id}: {e}");
    }
    unregister(state, document_id);
}

fn unregister(state: &AppState, document_id: &str) {
    let mut documents = state.documents.write();
    let before = documents.len();
    documents.retain(|d| d.id != document_id);
    let removed = documents.len() != before;
    drop(documents);
    if removed {
        state.persist_documents();
    }
}

async fn remove_from_stores(state: &AppState, document_id: &str) -> Result<(), ApiError> {
    state
        .vectors
        .delete_document(document_id)
        .map_err(|e| ApiError::internal("Failed to delete vectors", format!("{e:#}")))?;

    let keyword = state.keyword.clone();
    let id = document_id.to_string();
    tokio::task::spawn_blocking(move || keyword.delete_document(&id))
        .await
        .map_err(|e| ApiError::internal("Failed to delete keyword index entries", e))?
        .map_err(|e| ApiError::internal("Failed to delete keyword index entries", format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::Map;

    fn chunk(id: &str, doc: &str, content: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            document_id: doc.to_string(),
            document_title: None,
            content: content.to_string(),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_discard_document_clears_stores_and_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        let state = AppState::new(config).unwrap();

        let chunks = [
            chunk("p1", "plan", "budget approved"),
            chunk("o1", "ops", "budget forecast"),
        ];
        state.vectors.add_chunks(&chunks, vec![vec![1.0], vec![1.0]]).unwrap();
        state.keyword.index_chunks(&chunks).unwrap();
        for id in ["plan", "ops"] {
            state.documents.write().push(Document {
                id: id.to_string(),
                title: None,
                chunk_count: 1,
                indexed_at: Utc::now(),
            });
        }
        state.persist_documents();

        discard_document(&state, "plan").await;

        let registered: Vec<String> = state.documents.read().iter().map(|d| d.id.clone()).collect();
        assert_eq!(registered, vec!["ops"]);
        assert_eq!(state.vectors.entry_count(), 1);
        let hits = state.keyword.search("budget", 10, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "ops");

        // The registry on disk agrees.
        let saved: Vec<Document> =
            serde_json::from_str(&std::fs::read_to_string(state.config.db_path()).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "ops");
    }
}
