use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored text fragment, as persisted by both the vector store and the
/// keyword index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    #[serde(default)]
    pub document_title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A search result from either the semantic or the keyword path.
///
/// `relevance_score` is in the producing backend's native scale: cosine
/// similarity for semantic hits, BM25 (or the fixed default) for keyword hits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    pub content: String,
    pub relevance_score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Output of the hybrid merge. Same shape as its inputs, with the combined score.
pub type MergedResult = RetrievalResult;

impl RetrievalResult {
    pub fn from_chunk(chunk: &Chunk, relevance_score: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            document_id: chunk.document_id.clone(),
            document_title: chunk.document_title.clone(),
            content: chunk.content.clone(),
            relevance_score,
            metadata: chunk.metadata.clone(),
        }
    }
}

/// A registered document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: Option<String>,
    pub chunk_count: usize,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Semantic,
    Keyword,
    Hybrid,
}

impl SearchType {
    pub fn uses_semantic(self) -> bool {
        matches!(self, SearchType::Semantic | SearchType::Hybrid)
    }

    pub fn uses_keyword(self) -> bool {
        matches!(self, SearchType::Keyword | SearchType::Hybrid)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    pub document_ids: Option<Vec<String>>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    /// Falls back to the configured default limit when absent.
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Document-id restriction, if one was given and is non-empty.
    pub fn document_ids(&self) -> Option<&[String]> {
        self.filters
            .as_ref()
            .and_then(|f| f.document_ids.as_deref())
            .filter(|ids| !ids.is_empty())
    }
}

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievalResult>,
    /// Number of ranked results before truncation to the requested limit.
    pub total_results: usize,
    pub semantic_hits: usize,
    pub keyword_hits: usize,
    pub search_time_ms: u64,
}

/// One pre-cut chunk in an ingest request
#[derive(Debug, Clone, Deserialize)]
pub struct IngestChunk {
    pub chunk_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Ingest-document request
#[derive(Debug, Clone, Deserialize)]
pub struct IngestDocumentRequest {
    pub document_id: Option<String>,
    pub title: Option<String>,
    pub chunks: Vec<IngestChunk>,
}
