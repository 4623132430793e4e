//! Hybrid retrieval: graph and vector search merged into one ranking.
//!
//! The query is embedded once, both stores are searched concurrently,
//! and the result sets are merged by name with the higher score winning.

use luascope_core::{LuascopeError, SearchResult};

use crate::embedding::Embedder;
use crate::graph::GraphStore;
use crate::vector::VectorStore;

/// Searches both stores with one embedded query.
///
/// Generic over the embedding provider so tests can use a deterministic
/// stub.
#[derive(Debug)]
pub struct HybridRetriever<E: Embedder> {
    embedder: E,
    graph: GraphStore,
    vector: VectorStore,
}

impl<E: Embedder> HybridRetriever<E> {
    /// Wire an embedder to a store pair.
    pub fn new(embedder: E, graph: GraphStore, vector: VectorStore) -> Self {
        Self {
            embedder,
            graph,
            vector,
        }
    }

    /// Search both stores and merge the results.
    ///
    /// The query is embedded with `input_type: "query"`, then each store
    /// is searched with the same vector and limit on a blocking worker.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Embedding`] if the provider returns an
    /// empty vector, and [`LuascopeError::StoreRead`] if either store
    /// lookup fails. No partial results are returned.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, LuascopeError> {
        let query_vector = self.embedder.embed_query(query).await?;
        if query_vector.is_empty() {
            return Err(LuascopeError::Embedding(
                "embedding provider returned an empty query vector".into(),
            ));
        }

        let graph = self.graph.clone();
        let vector = self.vector.clone();
        let graph_vec = query_vector.clone();

        let (graph_hits, vector_hits) = tokio::join!(
            tokio::task::spawn_blocking(move || graph.search_similar(&graph_vec, limit)),
            tokio::task::spawn_blocking(move || vector.search(&query_vector, limit)),
        );

        let graph_hits = graph_hits
            .map_err(|e| LuascopeError::StoreRead(format!("graph search task failed: {e}")))??;
        let vector_hits = vector_hits
            .map_err(|e| LuascopeError::StoreRead(format!("vector search task failed: {e}")))??;

        Ok(merge_results(graph_hits, vector_hits))
    }
}

/// Merge two result sets into one ranking.
///
/// Concatenates graph results ahead of vector results, sorts by score
/// descending, keeps the first occurrence of each name (so the higher
/// score wins, and on an exact tie the graph occurrence wins), and
/// truncates to the longer input's length. Note that after
/// deduplication the merged list can be shorter than both inputs
/// combined, so the cap is the longer input, not their sum.
pub fn merge_results(
    graph_hits: Vec<SearchResult>,
    vector_hits: Vec<SearchResult>,
) -> Vec<SearchResult> {
    let cap = graph_hits.len().max(vector_hits.len());

    let mut combined = graph_hits;
    combined.extend(vector_hits);
    // Stable sort keeps graph hits ahead of vector hits on equal scores
    combined.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = std::collections::HashSet::new();
    let mut merged: Vec<SearchResult> = combined
        .into_iter()
        .filter(|hit| seen.insert(hit.entity.name.clone()))
        .collect();
    merged.truncate(cap);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use luascope_core::{CodeEntity, EntityKind};

    fn hit(name: &str, score: f64, deps: &[&str]) -> SearchResult {
        SearchResult {
            entity: CodeEntity {
                kind: EntityKind::Function,
                name: name.to_string(),
                content: String::new(),
                file_path: PathBuf::from("a.lua"),
                start_line: 0,
                end_line: 0,
                dependencies: deps.iter().map(|d| d.to_string()).collect(),
                vector: None,
            },
            score,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn merge_sorts_descending_by_score() {
        let merged = merge_results(
            vec![hit("a", 0.2, &[]), hit("b", 0.9, &[])],
            vec![hit("c", 0.5, &[])],
        );
        let names: Vec<&str> = merged.iter().map(|h| h.entity.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn merge_keeps_highest_score_for_duplicate_names() {
        let merged = merge_results(
            vec![hit("foo", 0.9, &["bar"])],
            vec![hit("foo", 0.95, &[])],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].score, 0.95);
    }

    #[test]
    fn merge_prefers_graph_occurrence_on_exact_tie() {
        let merged = merge_results(
            vec![hit("foo", 0.9, &["from_graph"])],
            vec![hit("foo", 0.9, &[])],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].dependencies, vec!["from_graph"]);
    }

    #[test]
    fn merge_truncates_to_longer_input() {
        let graph: Vec<SearchResult> = (0..5).map(|i| hit(&format!("g{i}"), 0.5, &[])).collect();
        let vector: Vec<SearchResult> = (0..3).map(|i| hit(&format!("v{i}"), 0.4, &[])).collect();

        let merged = merge_results(graph, vector);
        // 8 distinct names, capped at the longer input's length
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn merge_cap_with_overlap_still_uses_input_lengths() {
        let graph = vec![
            hit("a", 0.9, &[]),
            hit("b", 0.8, &[]),
            hit("c", 0.7, &[]),
        ];
        let vector = vec![hit("a", 0.6, &[]), hit("d", 0.5, &[])];

        let merged = merge_results(graph, vector);
        // 4 distinct names but the cap is max(3, 2) = 3
        assert_eq!(merged.len(), 3);
        let names: Vec<&str> = merged.iter().map(|h| h.entity.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_of_empty_inputs_is_empty() {
        assert!(merge_results(Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn merge_with_one_empty_side_passes_through() {
        let merged = merge_results(Vec::new(), vec![hit("v", 0.3, &[])]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity.name, "v");
    }

    struct StubEmbedder {
        vector: Vec<f32>,
    }

    impl Embedder for StubEmbedder {
        fn model(&self) -> &str {
            "stub"
        }

        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, LuascopeError> {
            Ok(vec![self.vector.clone(); texts.len()])
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, LuascopeError> {
            Ok(self.vector.clone())
        }
    }

    #[tokio::test]
    async fn empty_query_vector_is_an_embedding_error() {
        let dir = tempfile::tempdir().unwrap();
        let graph = crate::graph::GraphStore::open(&dir.path().join("graph.db")).unwrap();
        let vector = crate::vector::VectorStore::open(&dir.path().join("vectors.db"), 2).unwrap();
        let retriever = HybridRetriever::new(StubEmbedder { vector: Vec::new() }, graph, vector);

        let err = retriever.search("anything", 5).await.unwrap_err();
        assert!(matches!(err, LuascopeError::Embedding(_)));
    }

    #[tokio::test]
    async fn search_merges_hits_from_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let graph = crate::graph::GraphStore::open(&dir.path().join("graph.db")).unwrap();
        let vector = crate::vector::VectorStore::open(&dir.path().join("vectors.db"), 2).unwrap();

        let entity = CodeEntity {
            kind: EntityKind::Function,
            name: "foo".to_string(),
            content: "function foo() bar() end".to_string(),
            file_path: PathBuf::from("a.lua"),
            start_line: 0,
            end_line: 0,
            dependencies: vec!["bar".to_string()],
            vector: Some(vec![1.0, 0.0]),
        };
        graph.upsert_entities(std::slice::from_ref(&entity)).unwrap();
        vector.append(&[entity]).unwrap();

        let retriever = HybridRetriever::new(
            StubEmbedder {
                vector: vec![1.0, 0.0],
            },
            graph,
            vector,
        );
        let results = retriever.search("foo", 5).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity.name, "foo");
        assert!(results[0].score > 0.99);
        assert_eq!(results[0].dependencies, vec!["bar"]);
    }
}
