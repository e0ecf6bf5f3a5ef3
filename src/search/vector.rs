use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::models::{Chunk, RetrievalResult};

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity search.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
    /// 0 = unlimited
    max_entries: usize,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        Self::open_or_create_with_limit(vector_dir, 0)
    }

    pub fn open_or_create_with_limit(vector_dir: &Path, max_entries: usize) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries: Vec<VectorEntry> = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable vector store {}: {e}", persist_path.display());
                Vec::new()
            })
        } else {
            Vec::new()
        };

        tracing::info!("Vector store loaded with {} entries", entries.len());

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
            max_entries,
        })
    }

    /// Add vectors for chunks. `embeddings` must be parallel with `chunks`.
    pub fn add_chunks(&self, chunks: &[Chunk], embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let mut entries = self.entries.write();

        if self.max_entries > 0 && entries.len() + chunks.len() > self.max_entries {
            anyhow::bail!(
                "Vector store limit reached ({} entries, {} requested, max {})",
                entries.len(),
                chunks.len(),
                self.max_entries
            );
        }

        entries.extend(
            chunks
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorEntry { chunk, embedding }),
        );

        self.persist(&entries)
    }

    /// Swap a document's vectors for a new set. Nothing changes when the
    /// new set would push the store past its entry limit.
    pub fn replace_document(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let mut entries = self.entries.write();
        self.check_capacity(&entries, document_id, chunks.len())?;

        entries.retain(|e| e.chunk.document_id != document_id);
        entries.extend(
            chunks
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorEntry { chunk, embedding }),
        );

        self.persist(&entries)
    }

    /// Fails if replacing `document_id` with `incoming` vectors would exceed
    /// the entry limit.
    pub fn ensure_room_for(&self, document_id: &str, incoming: usize) -> Result<()> {
        self.check_capacity(&self.entries.read(), document_id, incoming)
    }

    fn check_capacity(
        &self,
        entries: &[VectorEntry],
        document_id: &str,
        incoming: usize,
    ) -> Result<()> {
        if self.max_entries == 0 {
            return Ok(());
        }
        let kept = entries
            .iter()
            .filter(|e| e.chunk.document_id != document_id)
            .count();
        if kept + incoming > self.max_entries {
            anyhow::bail!(
                "Vector store limit reached ({kept} entries kept, {incoming} requested, max {})",
                self.max_entries
            );
        }
        Ok(())
    }

    /// Which of `chunk_ids` are already stored under a document other than
    /// `document_id`, paired with their owner.
    pub fn chunks_owned_elsewhere(
        &self,
        document_id: &str,
        chunk_ids: &[&str],
    ) -> Vec<(String, String)> {
        let wanted: HashSet<&str> = chunk_ids.iter().copied().collect();
        self.entries
            .read()
            .iter()
            .filter(|e| {
                e.chunk.document_id != document_id && wanted.contains(e.chunk.chunk_id.as_str())
            })
            .map(|e| (e.chunk.chunk_id.clone(), e.chunk.document_id.clone()))
            .collect()
    }

    /// Delete all vectors for a document. Returns how many were removed.
    pub fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.chunk.document_id != document_id);
        let removed = before - entries.len();

        if removed > 0 {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Nearest neighbours by cosine similarity, keeping only hits at or above
    /// `threshold`, best first.
    pub fn nearest(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
        document_ids: Option<&[String]>,
    ) -> Vec<RetrievalResult> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .filter(|e| match document_ids {
                Some(ids) => ids.contains(&e.chunk.document_id),
                None => true,
            })
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| RetrievalResult::from_chunk(&e.chunk, score))
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Get counts grouped by document id.
    pub fn document_counts(&self) -> HashMap<String, usize> {
        let entries = self.entries.read();
        let mut counts = HashMap::new();
        for e in entries.iter() {
            *counts.entry(e.chunk.document_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp_path, &self.persist_path).context("Failed to replace vector store")?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn chunk(id: &str, doc: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            document_id: doc.to_string(),
            document_title: None,
            content: format!("chunk {id}"),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_threshold_filters_weak_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_chunks(
                &[chunk("close", "d1"), chunk("far", "d1")],
                vec![vec![1.0, 0.1], vec![0.1, 1.0]],
            )
            .unwrap();

        let hits = store.nearest(&[1.0, 0.0], 0.7, 10, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "close");
        assert!(hits[0].relevance_score >= 0.7);
    }

    #[test]
    fn test_document_filter_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_chunks(
                &[chunk("a", "d1"), chunk("b", "d2"), chunk("c", "d2")],
                vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.8, 0.2]],
            )
            .unwrap();

        let only_d2 = vec!["d2".to_string()];
        let hits = store.nearest(&[1.0, 0.0], 0.0, 1, Some(&only_d2));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "b");
    }

    #[test]
    fn test_mismatched_embedding_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert!(store.add_chunks(&[chunk("a", "d1")], vec![]).is_err());
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_entry_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create_with_limit(dir.path(), 1).unwrap();
        store.add_chunks(&[chunk("a", "d1")], vec![vec![1.0]]).unwrap();
        assert!(store.add_chunks(&[chunk("b", "d1")], vec![vec![1.0]]).is_err());
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open_or_create(dir.path()).unwrap();
            store
                .add_chunks(&[chunk("a", "d1"), chunk("b", "d2")], vec![vec![1.0], vec![1.0]])
                .unwrap();
            assert_eq!(store.delete_document("d2").unwrap(), 1);
        }
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.document_counts().get("d1"), Some(&1));
    }

    #[test]
    fn test_replace_document_swaps_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_chunks(&[chunk("a", "d1"), chunk("b", "d2")], vec![vec![1.0], vec![1.0]])
            .unwrap();

        let new = [chunk("a2", "d1"), chunk("a3", "d1")];
        store.replace_document("d1", &new, vec![vec![1.0]; 2]).unwrap();

        let counts = store.document_counts();
        assert_eq!(counts.get("d1"), Some(&2));
        assert_eq!(counts.get("d2"), Some(&1));
        let ids: Vec<String> = store
            .nearest(&[1.0], 0.0, 10, Some(&["d1".to_string()]))
            .into_iter()
            .map(|r| r.chunk_id)
            .collect();
        assert!(!ids.contains(&"a".to_string()));
    }

    #[test]
    fn test_replace_over_limit_keeps_old_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create_with_limit(dir.path(), 3).unwrap();
        let old = [chunk("a", "d1"), chunk("b", "d1"), chunk("c", "d1")];
        store.add_chunks(&old, vec![vec![1.0]; 3]).unwrap();

        // Replacing 3 with 3 fits, replacing 3 with 4 does not.
        assert!(store.ensure_room_for("d1", 3).is_ok());
        assert!(store.ensure_room_for("d1", 4).is_err());
        assert!(store.ensure_room_for("d2", 1).is_err());

        let new = [chunk("w", "d1"), chunk("x", "d1"), chunk("y", "d1"), chunk("z", "d1")];
        assert!(store.replace_document("d1", &new, vec![vec![1.0]; 4]).is_err());
        assert_eq!(store.entry_count(), 3);
        assert_eq!(store.nearest(&[1.0], 0.0, 10, None)[0].document_id, "d1");
    }

    #[test]
    fn test_chunks_owned_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_chunks(&[chunk("c1", "plan"), chunk("c2", "plan")], vec![vec![1.0], vec![1.0]])
            .unwrap();

        assert_eq!(
            store.chunks_owned_elsewhere("ops", &["c1", "c9"]),
            vec![("c1".to_string(), "plan".to_string())]
        );
        // A document may reuse its own chunk ids.
        assert!(store.chunks_owned_elsewhere("plan", &["c1", "c2"]).is_empty());
    }
}
