//! Integration tests for the retrieval stores and the hybrid merge.
//!
//! These exercise indexing and both search paths without an embedding
//! provider: embeddings are supplied directly.

use serde_json::{json, Map};

use rag_search::config::KeywordScoring;
use rag_search::models::{Chunk, SearchType};
use rag_search::search::hybrid::{merge, HybridResultMerger, DEFAULT_KEYWORD_SCORE};
use rag_search::search::keyword::KeywordIndex;
use rag_search::search::pipeline::{apply_keyword_scoring, assemble};
use rag_search::search::vector::VectorStore;

fn chunk(id: &str, doc: &str, title: &str, content: &str) -> Chunk {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), json!(format!("{doc}.pdf")));
    Chunk {
        chunk_id: id.to_string(),
        document_id: doc.to_string(),
        document_title: Some(title.to_string()),
        content: content.to_string(),
        metadata,
    }
}

/// Helper: chunks of a meeting-notes document.
fn meeting_notes() -> Vec<Chunk> {
    vec![
        chunk("m1", "meeting", "Weekly Sync", "The team agreed to move the launch date by two weeks."),
        chunk("m2", "meeting", "Weekly Sync", "Action item: finance to confirm the marketing budget."),
        chunk("m3", "meeting", "Weekly Sync", "Vendor contract renewal is blocked on legal review."),
    ]
}

/// Helper: chunks of a project charter.
fn project_charter() -> Vec<Chunk> {
    vec![
        chunk("p1", "charter", "Project Charter", "The project budget is capped at two hundred thousand."),
        chunk("p2", "charter", "Project Charter", "Key stakeholders: operations, finance, and legal."),
    ]
}

// 3-d toy embeddings: (schedule, money, legal)
fn embeddings_for(chunks: &[Chunk]) -> Vec<Vec<f32>> {
    chunks
        .iter()
        .map(|c| match c.chunk_id.as_str() {
            "m1" => vec![0.95, 0.05, 0.0],
            "m2" => vec![0.1, 0.9, 0.1],
            "m3" => vec![0.0, 0.2, 0.95],
            "p1" => vec![0.05, 0.98, 0.05],
            "p2" => vec![0.2, 0.5, 0.6],
            _ => vec![0.0, 0.0, 0.0],
        })
        .collect()
}

#[test]
fn test_end_to_end_keyword_index_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let index = KeywordIndex::open_or_create(dir.path()).unwrap();

    index.index_chunks(&meeting_notes()).unwrap();
    index.index_chunks(&project_charter()).unwrap();

    let results = index.search("budget", 10, None).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert!(ids.contains(&"m2"));
    assert!(ids.contains(&"p1"));
    assert!(results.iter().all(|r| r.metadata.contains_key("source")));
}

#[test]
fn test_end_to_end_vector_store_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let store = VectorStore::open_or_create(dir.path()).unwrap();

    let chunks = meeting_notes();
    store.add_chunks(&chunks, embeddings_for(&chunks)).unwrap();

    // Query in the "money" direction
    let results = store.nearest(&[0.0, 1.0, 0.0], 0.7, 10, None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "m2");
    assert_eq!(results[0].document_title.as_deref(), Some("Weekly Sync"));
}

#[test]
fn test_end_to_end_hybrid_merge_over_both_stores() {
    let vec_dir = tempfile::tempdir().unwrap();
    let idx_dir = tempfile::tempdir().unwrap();
    let store = VectorStore::open_or_create(vec_dir.path()).unwrap();
    let index = KeywordIndex::open_or_create(idx_dir.path()).unwrap();

    let mut all = meeting_notes();
    all.extend(project_charter());
    store.add_chunks(&all, embeddings_for(&all)).unwrap();
    index.index_chunks(&all).unwrap();

    // "money" query: semantic finds m2 and p1; keyword "budget" finds m2 and p1
    // too, "legal" adds m3 and p2 as keyword-only hits.
    let semantic = store.nearest(&[0.0, 1.0, 0.0], 0.7, 10, None);
    let keyword = apply_keyword_scoring(
        index.search("budget legal", 10, None).unwrap(),
        KeywordScoring::Fixed,
        DEFAULT_KEYWORD_SCORE,
    );
    let semantic_ids: Vec<String> = semantic.iter().map(|r| r.chunk_id.clone()).collect();

    let merged = merge(semantic, keyword);
    assert_eq!(merged.len(), 4);

    // Chunks found by both paths outrank keyword-only chunks.
    let top: Vec<&str> = merged.iter().take(2).map(|r| r.chunk_id.as_str()).collect();
    assert!(semantic_ids.iter().all(|id| top.contains(&id.as_str())));
    for r in &merged[2..] {
        assert!((r.relevance_score - 0.15).abs() < 1e-6);
    }
    for pair in merged.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
}

#[test]
fn test_keyword_only_hybrid_when_semantic_empty() {
    let dir = tempfile::tempdir().unwrap();
    let index = KeywordIndex::open_or_create(dir.path()).unwrap();
    index.index_chunks(&meeting_notes()).unwrap();

    let keyword = apply_keyword_scoring(
        index.search("vendor", 10, None).unwrap(),
        KeywordScoring::Fixed,
        DEFAULT_KEYWORD_SCORE,
    );
    let ranked = assemble(
        SearchType::Hybrid,
        Vec::new(),
        keyword,
        &HybridResultMerger::default(),
    );
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk_id, "m3");
    assert!((ranked[0].relevance_score - 0.15).abs() < 1e-6);
}

#[test]
fn test_document_filter_applies_to_both_stores() {
    let vec_dir = tempfile::tempdir().unwrap();
    let idx_dir = tempfile::tempdir().unwrap();
    let store = VectorStore::open_or_create(vec_dir.path()).unwrap();
    let index = KeywordIndex::open_or_create(idx_dir.path()).unwrap();

    let mut all = meeting_notes();
    all.extend(project_charter());
    store.add_chunks(&all, embeddings_for(&all)).unwrap();
    index.index_chunks(&all).unwrap();

    let only_charter = vec!["charter".to_string()];
    let semantic = store.nearest(&[0.0, 1.0, 0.0], 0.7, 10, Some(&only_charter));
    let keyword = index.search("budget", 10, Some(&only_charter)).unwrap();

    assert!(!semantic.is_empty());
    assert!(!keyword.is_empty());
    assert!(semantic.iter().all(|r| r.document_id == "charter"));
    assert!(keyword.iter().all(|r| r.document_id == "charter"));
}

#[test]
fn test_delete_document_removes_from_both_indexes() {
    let vec_dir = tempfile::tempdir().unwrap();
    let idx_dir = tempfile::tempdir().unwrap();
    let store = VectorStore::open_or_create(vec_dir.path()).unwrap();
    let index = KeywordIndex::open_or_create(idx_dir.path()).unwrap();

    let chunks = meeting_notes();
    store.add_chunks(&chunks, embeddings_for(&chunks)).unwrap();
    index.index_chunks(&chunks).unwrap();

    // Verify data exists
    assert!(!index.search("launch", 10, None).unwrap().is_empty());
    assert_eq!(store.entry_count(), 3);

    // Delete
    index.delete_document("meeting").unwrap();
    assert_eq!(store.delete_document("meeting").unwrap(), 3);

    // Verify clean
    assert!(index.search("launch", 10, None).unwrap().is_empty());
    assert_eq!(store.entry_count(), 0);
}
