use anyhow::Context;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::Config;
use crate::models::Document;
use crate::search::keyword::KeywordIndex;
use crate::search::vector::VectorStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub documents: Arc<RwLock<Vec<Document>>>,
    pub keyword: Arc<KeywordIndex>,
    pub vectors: Arc<VectorStore>,
    pub http_client: reqwest::Client,
    /// One permit: document ingest and delete run one at a time.
    pub write_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        // Ensure data directories exist
        std::fs::create_dir_all(config.index_dir())?;
        std::fs::create_dir_all(config.vector_dir())?;

        // Load persisted document registry
        let documents = if config.db_path().exists() {
            let data = std::fs::read_to_string(config.db_path())
                .context("Failed to read document registry")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        let keyword = KeywordIndex::open_or_create(&config.index_dir())?;
        let vectors =
            VectorStore::open_or_create_with_limit(&config.vector_dir(), config.max_vector_entries)?;

        Ok(Self {
            config: Arc::new(config),
            documents: Arc::new(RwLock::new(documents)),
            keyword: Arc::new(keyword),
            vectors: Arc::new(vectors),
            http_client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            write_semaphore: Arc::new(tokio::sync::Semaphore::new(1)),
        })
    }

    /// Persist the document registry to disk (atomic write via temp file + rename).
    pub fn persist_documents(&self) {
        let documents = self.documents.read();
        match serde_json::to_string_pretty(&*documents) {
            Ok(data) => {
                let db_path = self.config.db_path();
                let tmp_path = db_path.with_extension("json.tmp");
                let written = std::fs::write(&tmp_path, &data)
                    .and_then(|()| std::fs::rename(&tmp_path, &db_path));
                if let Err(e) = written {
                    tracing::error!("Failed to persist document registry: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to serialize document registry: {e}"),
        }
    }
}
