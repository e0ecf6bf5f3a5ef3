//! Retrieval paths and ranking assembly for a search request.
//!
//! ```text
//!                 query
//!          ┌────────┴────────┐
//!          ▼                 ▼
//!   embed + nearest     BM25 search
//!   (threshold 0.7)    (spawn_blocking)
//!          │                 │ scoring policy
//!          │                 │ (fixed 0.5 | normalized)
//!          └───── deadline ──┘
//!                   │ timed-out / failed keyword path -> empty list
//!                   ▼
//!     semantic | keyword | hybrid (merge 0.7 / 0.3)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{KeywordScoring, LlmConfig};
use crate::llm::embeddings::embed_single;
use crate::models::{RetrievalResult, SearchType};
use crate::search::hybrid::HybridResultMerger;
use crate::search::keyword::KeywordIndex;
use crate::search::vector::VectorStore;

/// Embed the query and look up its nearest chunks.
pub async fn semantic_search(
    client: &reqwest::Client,
    llm: &LlmConfig,
    vectors: &VectorStore,
    query: &str,
    threshold: f32,
    limit: usize,
    document_ids: Option<&[String]>,
) -> Result<Vec<RetrievalResult>> {
    let embedding = embed_single(client, llm, query)
        .await
        .context("Failed to embed query")?;
    Ok(vectors.nearest(&embedding, threshold, limit, document_ids))
}

/// BM25 search on the blocking pool. Scores are raw BM25.
pub async fn keyword_search(
    index: Arc<KeywordIndex>,
    query: &str,
    limit: usize,
    document_ids: Option<&[String]>,
) -> Result<Vec<RetrievalResult>> {
    let query = query.to_string();
    let ids = document_ids.map(<[String]>::to_vec);
    tokio::task::spawn_blocking(move || index.search(&query, limit, ids.as_deref()))
        .await
        .context("Keyword search task failed")?
}

/// Run `fetch` under a deadline. `None` means the deadline passed.
pub async fn with_deadline<F: Future>(path: &str, deadline: Duration, fetch: F) -> Option<F::Output> {
    match tokio::time::timeout(deadline, fetch).await {
        Ok(output) => Some(output),
        Err(_) => {
            tracing::warn!("{path} search exceeded {deadline:?}, continuing without it");
            None
        }
    }
}

/// Collapse a path outcome to a result list, substituting an empty list when
/// the path timed out or its backend failed.
pub fn or_empty(path: &str, outcome: Option<Result<Vec<RetrievalResult>>>) -> Vec<RetrievalResult> {
    match outcome {
        Some(Ok(hits)) => hits,
        Some(Err(e)) => {
            tracing::warn!("{path} search failed, continuing without it: {e:#}");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Put keyword hits on the scale the merger expects.
pub fn apply_keyword_scoring(
    mut hits: Vec<RetrievalResult>,
    scoring: KeywordScoring,
    default_score: f32,
) -> Vec<RetrievalResult> {
    let best = hits
        .iter()
        .map(|h| h.relevance_score)
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max);

    for hit in &mut hits {
        hit.relevance_score = match scoring {
            KeywordScoring::Normalized if best > 0.0 && hit.relevance_score.is_finite() => {
                hit.relevance_score / best
            }
            _ => default_score,
        };
    }
    hits
}

/// Build the final ranking for a search type. Only `hybrid` merges; the
/// other types return their single list as fetched.
pub fn assemble(
    search_type: SearchType,
    semantic: Vec<RetrievalResult>,
    keyword: Vec<RetrievalResult>,
    merger: &HybridResultMerger,
) -> Vec<RetrievalResult> {
    match search_type {
        SearchType::Semantic => semantic,
        SearchType::Keyword => keyword,
        SearchType::Hybrid => merger.merge(semantic, keyword),
    }
}
