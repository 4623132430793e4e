//! Repository ingestion: reachability filter, extraction, embedding,
//! persistence.
//!
//! Processing is fail-fast: the first error from any stage aborts the
//! run before anything is persisted. Embedding happens per file; the
//! accumulated entities are written to both stores in a single pass at
//! the end.

use serde::{Deserialize, Serialize};

use luascope_core::{CodeEntity, LuascopeError};
use luascope_extract::annotations::expand_api_annotations;
use luascope_extract::extractor::EntityExtractor;
use luascope_extract::resolver::{build_repo_map, filter_reachable};
use luascope_extract::walker::SourceFile;

use crate::embedding::{attach_embeddings, Embedder};
use crate::writer::DualStoreWriter;

/// Counters reported after an ingestion run.
///
/// # Examples
///
/// ```
/// use luascope_index::pipeline::IngestStats;
///
/// let stats = IngestStats {
///     files_walked: 12,
///     files_reachable: 4,
///     entities_indexed: 31,
/// };
/// assert!(stats.files_reachable <= stats.files_walked);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Lua files found by the walker.
    pub files_walked: usize,
    /// Files kept by the entry-point reachability filter.
    pub files_reachable: usize,
    /// Entities written to the stores.
    pub entities_indexed: usize,
}

/// Ingest a repository's source files into both stores.
///
/// Files are narrowed to those reachable from the entry points, each
/// reachable file is extracted and embedded, and the accumulated
/// entities are persisted once at the end. A repository with no
/// reachable entities still gets its vector store bootstrapped.
///
/// # Errors
///
/// Propagates the first [`LuascopeError`] from parsing, embedding, or
/// the stores; nothing is retried and no partial batch is written.
pub async fn process_repository<E: Embedder>(
    files: &[SourceFile],
    entry_points: &[String],
    embedder: &E,
    writer: &DualStoreWriter,
) -> Result<IngestStats, LuascopeError> {
    let repo_map = build_repo_map(files)?;
    let reachable = filter_reachable(repo_map, entry_points);

    let extractor = EntityExtractor::new()?;
    let mut all_entities: Vec<CodeEntity> = Vec::new();
    let mut files_reachable = 0;

    for file in files {
        let path = file.path.to_string_lossy().to_string();
        if !reachable.contains_key(&path) {
            continue;
        }
        files_reachable += 1;

        let content = if path.contains("_api/common") {
            expand_api_annotations(&file.content)
        } else {
            file.content.clone()
        };

        let mut entities = extractor.extract(&file.path, &content)?;
        attach_embeddings(embedder, &mut entities).await?;
        all_entities.extend(entities);
    }

    writer.persist(&all_entities)?;

    Ok(IngestStats {
        files_walked: files.len(),
        files_reachable,
        entities_indexed: all_entities.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::graph::GraphStore;
    use crate::vector::VectorStore;

    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn model(&self) -> &str {
            "stub"
        }

        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, LuascopeError> {
            Ok(vec![vec![1.0, 0.0]; texts.len()])
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, LuascopeError> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn model(&self) -> &str {
            "failing"
        }

        async fn embed_documents(
            &self,
            _texts: &[String],
        ) -> Result<Vec<Vec<f32>>, LuascopeError> {
            Err(LuascopeError::Embedding("provider unavailable".into()))
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, LuascopeError> {
            Err(LuascopeError::Embedding("provider unavailable".into()))
        }
    }

    fn writer(dir: &tempfile::TempDir) -> DualStoreWriter {
        let graph = GraphStore::open(&dir.path().join("graph.db")).unwrap();
        let vector = VectorStore::open(&dir.path().join("vectors.db"), 2).unwrap();
        DualStoreWriter::new(graph, vector)
    }

    fn source(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            content: content.to_string(),
        }
    }

    fn entry_points() -> Vec<String> {
        vec!["main.lua".to_string()]
    }

    #[tokio::test]
    async fn ingest_indexes_reachable_entities_only() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(&dir);
        let files = vec![
            source("main.lua", "require(\"utils\")\nfunction boot() end"),
            source("utils.lua", "function util() end"),
            source("orphan.lua", "function unused() end"),
        ];

        let stats = process_repository(&files, &entry_points(), &StubEmbedder, &writer)
            .await
            .unwrap();

        assert_eq!(stats.files_walked, 3);
        assert_eq!(stats.files_reachable, 2);
        assert_eq!(stats.entities_indexed, 2);
        // Placeholder plus the two entities
        assert_eq!(writer.vector().record_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn ingest_with_no_entities_bootstraps_vector_store() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(&dir);
        let files = vec![source("main.lua", "-- nothing defined here\n")];

        let stats = process_repository(&files, &entry_points(), &StubEmbedder, &writer)
            .await
            .unwrap();

        assert_eq!(stats.entities_indexed, 0);
        assert_eq!(writer.vector().record_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_before_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(&dir);
        let files = vec![source("main.lua", "function boot() end")];

        let err = process_repository(&files, &entry_points(), &FailingEmbedder, &writer)
            .await
            .unwrap_err();

        assert!(matches!(err, LuascopeError::Embedding(_)));
        assert_eq!(writer.graph().entity_count().unwrap(), 0);
        assert_eq!(writer.vector().record_count().unwrap(), 0);
    }
}
