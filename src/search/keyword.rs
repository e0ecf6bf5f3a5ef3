use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::Map;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{Index, IndexWriter, ReloadPolicy, Term};

use crate::models::{Chunk, RetrievalResult};

/// Heap budget for a tantivy index writer.
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Full-text (BM25) keyword index built on tantivy.
pub struct KeywordIndex {
    index: Index,
    /// tantivy allows a single writer per index at a time.
    write_lock: Mutex<()>,
    // Field handles
    f_chunk_id: Field,
    f_document_id: Field,
    f_document_title: Field,
    f_content: Field,
    f_metadata: Field,
}

impl KeywordIndex {
    /// Create or open a keyword index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
        let f_document_id = schema_builder.add_text_field("document_id", STRING | STORED);
        let f_document_title = schema_builder.add_text_field("document_title", TEXT | STORED);
        let f_content = schema_builder.add_text_field("content", TEXT | STORED);
        let f_metadata = schema_builder.add_text_field("metadata", STORED);

        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            write_lock: Mutex::new(()),
            f_chunk_id,
            f_document_id,
            f_document_title,
            f_content,
            f_metadata,
        })
    }

    /// Index a batch of chunks.
    pub fn index_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.write(|writer| self.add_chunks(writer, chunks))
    }

    /// Drop a document's chunks and add `chunks` in one commit. If the commit
    /// fails the index keeps the previous version.
    pub fn replace_document(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        self.write(|writer| {
            writer.delete_term(Term::from_field_text(self.f_document_id, document_id));
            self.add_chunks(writer, chunks)
        })
    }

    /// Delete all chunks of a given document.
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        self.write(|writer| {
            writer.delete_term(Term::from_field_text(self.f_document_id, document_id));
            Ok(())
        })
    }

    fn write(&self, ops: impl FnOnce(&mut IndexWriter) -> Result<()>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut writer: IndexWriter = self
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        ops(&mut writer)?;
        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    fn add_chunks(&self, writer: &mut IndexWriter, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            let mut doc = TantivyDocument::default();
            doc.add_text(self.f_chunk_id, &chunk.chunk_id);
            doc.add_text(self.f_document_id, &chunk.document_id);
            if let Some(title) = &chunk.document_title {
                doc.add_text(self.f_document_title, title);
            }
            doc.add_text(self.f_content, &chunk.content);
            doc.add_text(self.f_metadata, serde_json::to_string(&chunk.metadata)?);
            writer.add_document(doc)?;
        }
        Ok(())
    }

    /// Search the index. `relevance_score` on each hit is the raw BM25 score.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        document_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        let query_parser =
            QueryParser::for_index(&self.index, vec![self.f_content, self.f_document_title]);
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Lenient parse of {query_str:?} dropped: {errors:?}");
        }

        let query = match document_ids {
            Some(ids) => self.restrict_to_documents(query, ids),
            None => query,
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let metadata = self
                .text(&doc, self.f_metadata)
                .and_then(|raw| serde_json::from_str::<Map<String, serde_json::Value>>(&raw).ok())
                .unwrap_or_default();

            hits.push(RetrievalResult {
                chunk_id: self.text(&doc, self.f_chunk_id).unwrap_or_default(),
                document_id: self.text(&doc, self.f_document_id).unwrap_or_default(),
                document_title: self.text(&doc, self.f_document_title),
                content: self.text(&doc, self.f_content).unwrap_or_default(),
                relevance_score: score,
                metadata,
            });
        }

        Ok(hits)
    }

    /// AND the text query with "document_id is one of `ids`". The filter
    /// clause scores zero so hits keep their plain BM25 score.
    fn restrict_to_documents(&self, query: Box<dyn Query>, ids: &[String]) -> Box<dyn Query> {
        let any_document: Vec<(Occur, Box<dyn Query>)> = ids
            .iter()
            .map(|id| {
                let term = Term::from_field_text(self.f_document_id, id);
                let clause: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                (Occur::Should, clause)
            })
            .collect();
        let filter = ConstScoreQuery::new(Box::new(BooleanQuery::new(any_document)), 0.0);

        Box::new(BooleanQuery::new(vec![
            (Occur::Must, query),
            (Occur::Must, Box::new(filter)),
        ]))
    }

    fn text(&self, doc: &TantivyDocument, field: Field) -> Option<String> {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}
