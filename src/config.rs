use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::search::hybrid::{
    MergeWeights, DEFAULT_KEYWORD_SCORE, DEFAULT_SIMILARITY_THRESHOLD, KEYWORD_WEIGHT,
    SEMANTIC_WEIGHT,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the keyword index, vectors and document registry are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding provider configuration
    pub llm: LlmConfig,
    /// Ranking policy for search requests
    pub search: SearchConfig,
    /// Maximum total vector entries in memory (0 = unlimited)
    pub max_vector_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible embedding API
    pub base_url: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// Bearer token; local servers usually accept any value
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

/// How keyword hits are scored before merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordScoring {
    /// Every keyword hit gets `keyword_default_score`.
    #[default]
    Fixed,
    /// BM25 scores divided by the best score in the list, so the top hit is 1.0.
    Normalized,
}

impl KeywordScoring {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "normalized" | "normalised" => Some(Self::Normalized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub keyword_default_score: f32,
    pub keyword_scoring: KeywordScoring,
    /// Minimum cosine similarity for semantic hits
    pub similarity_threshold: f32,
    pub default_limit: usize,
    /// Requested limits above this are clamped
    pub max_limit: usize,
    /// Deadline for each retrieval path (embedding + vector lookup, keyword lookup)
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            max_vector_entries: 500_000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            embedding_dim: 1536,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: SEMANTIC_WEIGHT,
            keyword_weight: KEYWORD_WEIGHT,
            keyword_default_score: DEFAULT_KEYWORD_SCORE,
            keyword_scoring: KeywordScoring::Fixed,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_limit: 10,
            max_limit: 100,
            fetch_timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    pub fn merge_weights(&self) -> MergeWeights {
        MergeWeights {
            semantic: self.semantic_weight,
            keyword: self.keyword_weight,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RAG_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("RAG_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(val) = std::env::var("RAG_SEARCH_MAX_VECTOR_ENTRIES") {
            if let Ok(v) = val.parse() {
                config.max_vector_entries = v;
            }
        }

        // Embedding provider
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        // Ranking policy
        let search = &mut config.search;
        if let Some(v) = env_f32("RAG_SEMANTIC_WEIGHT") {
            search.semantic_weight = v;
        }
        if let Some(v) = env_f32("RAG_KEYWORD_WEIGHT") {
            search.keyword_weight = v;
        }
        if let Some(v) = env_f32("RAG_KEYWORD_DEFAULT_SCORE") {
            search.keyword_default_score = v;
        }
        if let Some(v) = env_f32("RAG_SIMILARITY_THRESHOLD") {
            search.similarity_threshold = v;
        }
        if let Ok(val) = std::env::var("RAG_KEYWORD_SCORING") {
            match KeywordScoring::parse(&val) {
                Some(scoring) => search.keyword_scoring = scoring,
                None => tracing::warn!("Ignoring unknown RAG_KEYWORD_SCORING value {val:?}"),
            }
        }
        if let Ok(val) = std::env::var("RAG_DEFAULT_LIMIT") {
            if let Ok(v) = val.parse::<usize>() {
                search.default_limit = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("RAG_MAX_LIMIT") {
            if let Ok(v) = val.parse::<usize>() {
                search.max_limit = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("RAG_FETCH_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                search.fetch_timeout_secs = v.max(1);
            }
        }

        config
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }
}

/// Parse a finite, non-negative float from the environment.
fn env_f32(name: &str) -> Option<f32> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            tracing::warn!("Ignoring invalid {name} value {raw:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_ranking_constants() {
        let config = Config::default();
        assert_eq!(config.search.merge_weights(), MergeWeights::default());
        assert_eq!(config.search.keyword_default_score, 0.5);
        assert_eq!(config.search.similarity_threshold, 0.7);
        assert_eq!(config.search.keyword_scoring, KeywordScoring::Fixed);
        assert_eq!(config.search.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_keyword_scoring_parse() {
        assert_eq!(KeywordScoring::parse("fixed"), Some(KeywordScoring::Fixed));
        assert_eq!(KeywordScoring::parse(" Normalized "), Some(KeywordScoring::Normalized));
        assert_eq!(KeywordScoring::parse("bm25"), None);
    }

    #[test]
    fn test_data_paths() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/rag"),
            ..Config::default()
        };
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/rag/index"));
        assert_eq!(config.vector_dir(), PathBuf::from("/tmp/rag/vectors"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/rag/documents.json"));
    }
}
