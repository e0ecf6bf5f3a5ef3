//! # rag-search
//!
//! Retrieval service for a RAG document store. Pre-chunked documents are
//! embedded and indexed twice: in a vector store for semantic search and in
//! a BM25 index for keyword search. Queries run in `semantic`, `keyword` or
//! `hybrid` mode.
//!
//! ## Hybrid pipeline
//!
//! ```text
//!                    ┌─────────────┐
//!                    │    Query     │
//!                    └──────┬───────┘
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!      ┌─────────────────┐     ┌─────────────────┐
//!      │ Embed + nearest │     │   BM25 search   │
//!      │ cosine >= 0.7   │     │ score := 0.5    │
//!      └────────┬────────┘     └────────┬────────┘
//!               │  each under a deadline │
//!               └───────────┬───────────┘
//!                           ▼
//!              ┌─────────────────────────┐
//!              │  Merge by chunk_id      │
//!              │  semantic ×0.7          │
//!              │  keyword  ×0.3 (added)  │
//!              │  sort desc, stable ties │
//!              └────────────┬────────────┘
//!                           ▼
//!              ┌─────────────────────────┐
//!              │   Truncate to limit     │
//!              └─────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, embeddings and ranking policy
//! - [`models`] - Shared data types: `Chunk`, `RetrievalResult`, `Document`, request/response types
//! - [`search::hybrid`] - The semantic/keyword result merger and its weight constants
//! - [`search::vector`] - In-memory vector store with cosine similarity and disk persistence
//! - [`search::keyword`] - BM25 full-text index powered by tantivy
//! - [`search::pipeline`] - Retrieval paths, deadlines, degradation and ranking assembly
//! - [`llm::embeddings`] - Batch embedding generation via an OpenAI-compatible API
//! - [`api`] - Axum HTTP handlers for search and document management
//! - [`state`] - Shared application state holding indexes, config and the document registry

pub mod api;
pub mod config;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
