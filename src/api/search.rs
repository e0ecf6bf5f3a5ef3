use std::time::Instant;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::models::{SearchRequest, SearchResponse};
use crate::search::hybrid::HybridResultMerger;
use crate::search::pipeline::{
    apply_keyword_scoring, assemble, keyword_search, or_empty, semantic_search, with_deadline,
};
use crate::state::AppState;

/// POST /api/rag/search - semantic, keyword or hybrid retrieval:
///   1. Semantic path: embed query, nearest chunks above the similarity threshold
///   2. Keyword path: BM25 search, scored by the keyword scoring policy
///   3. Both paths run concurrently, each under the fetch deadline
///   4. Hybrid merges the two lists (0.7 / 0.3); then truncate to `limit`
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    run_search(&state, &req).await.map(Json)
}

pub async fn run_search(state: &AppState, req: &SearchRequest) -> Result<SearchResponse, ApiError> {
    let started = Instant::now();
    let cfg = &state.config.search;

    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }

    let limit = req.limit.unwrap_or(cfg.default_limit);
    if limit == 0 {
        return Err(ApiError::BadRequest("Limit must be at least 1".to_string()));
    }
    let limit = limit.min(cfg.max_limit);

    let search_type = req.search_type;
    let document_ids = req.document_ids();
    let deadline = cfg.fetch_timeout();

    // ── Fetch both paths concurrently ────────────────────────
    let semantic_fut = async {
        if !search_type.uses_semantic() {
            return Ok(Vec::new());
        }
        let fetch = semantic_search(
            &state.http_client,
            &state.config.llm,
            &state.vectors,
            query,
            cfg.similarity_threshold,
            limit,
            document_ids,
        );
        match with_deadline("semantic", deadline, fetch).await {
            Some(Ok(hits)) => Ok(hits),
            // Embedding-provider failures are surfaced, not degraded.
            Some(Err(e)) => {
                tracing::error!("Semantic search failed: {e:#}");
                Err(ApiError::Embedding(format!("{e:#}")))
            }
            None => Ok(Vec::new()),
        }
    };

    let keyword_fut = async {
        if !search_type.uses_keyword() {
            return Vec::new();
        }
        let fetch = keyword_search(state.keyword.clone(), query, limit, document_ids);
        let hits = or_empty("keyword", with_deadline("keyword", deadline, fetch).await);
        apply_keyword_scoring(hits, cfg.keyword_scoring, cfg.keyword_default_score)
    };

    let (semantic, keyword) = tokio::join!(semantic_fut, keyword_fut);
    let semantic = semantic?;

    let semantic_hits = semantic.len();
    let keyword_hits = keyword.len();

    // ── Rank and truncate ─────────────────────────────────────
    let merger = HybridResultMerger::new(cfg.merge_weights());
    let mut results = assemble(search_type, semantic, keyword, &merger);
    let total_results = results.len();
    results.truncate(limit);

    let search_time_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "{search_type:?} search: {semantic_hits} semantic, {keyword_hits} keyword, {total_results} ranked in {search_time_ms}ms"
    );

    Ok(SearchResponse {
        results,
        total_results,
        semantic_hits,
        keyword_hits,
        search_time_ms,
    })
}
