//! Embedding, storage, and hybrid retrieval for luascope.
//!
//! The ingestion back half and the query path:
//! - [`embedding`] — Voyage API client and the embedding gate
//! - [`graph`] — SQLite dependency graph with merge-by-name upserts
//! - [`vector`] — append-only SQLite vector store
//! - [`writer`] — dual-store persistence, graph first
//! - [`retriever`] — concurrent graph + vector search with score merging
//! - [`pipeline`] — end-to-end repository ingestion

pub mod embedding;
pub mod graph;
pub mod pipeline;
pub mod retriever;
pub mod vector;
pub mod writer;

mod similarity;
