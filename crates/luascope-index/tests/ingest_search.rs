//! End-to-end ingest-then-search against real temp-dir stores.

use std::fs;
use std::path::PathBuf;

use luascope_core::{EntityKind, LuascopeError};
use luascope_extract::walker::walk_lua_repo;
use luascope_index::embedding::Embedder;
use luascope_index::graph::GraphStore;
use luascope_index::pipeline::process_repository;
use luascope_index::retriever::HybridRetriever;
use luascope_index::vector::VectorStore;
use luascope_index::writer::DualStoreWriter;

/// Deterministic embedder: vector depends on whether the text mentions
/// "foo", so the foo entity outranks everything else for a foo query.
struct StubEmbedder;

impl StubEmbedder {
    fn vector_for(text: &str) -> Vec<f32> {
        if text.contains("foo") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        }
    }
}

impl Embedder for StubEmbedder {
    fn model(&self) -> &str {
        "stub"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LuascopeError> {
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LuascopeError> {
        Ok(Self::vector_for(query))
    }
}

#[tokio::test]
async fn ingest_then_search_returns_entity_with_dependencies() {
    let repo = tempfile::tempdir().unwrap();
    fs::write(
        repo.path().join("main.lua"),
        "function foo() bar() end\nlocal t = { f = function() end }\n",
    )
    .unwrap();

    let stores = tempfile::tempdir().unwrap();
    let graph = GraphStore::open(&stores.path().join("graph.db")).unwrap();
    let vector = VectorStore::open(&stores.path().join("vectors.db"), 2).unwrap();
    let writer = DualStoreWriter::new(graph.clone(), vector.clone());

    let files = walk_lua_repo(repo.path()).unwrap();
    let entry_points = vec!["main.lua".to_string()];
    let stats = process_repository(&files, &entry_points, &StubEmbedder, &writer)
        .await
        .unwrap();

    assert_eq!(stats.files_walked, 1);
    assert_eq!(stats.entities_indexed, 2);

    let retriever = HybridRetriever::new(StubEmbedder, graph, vector);
    let results = retriever.search("foo", 5).await.unwrap();

    let foo = results
        .iter()
        .find(|r| r.entity.name == "foo")
        .expect("foo should be retrievable");
    assert_eq!(foo.entity.kind, EntityKind::Function);
    assert!(foo.score > 0.0);
    assert_eq!(foo.dependencies, vec!["bar"]);
    assert_eq!(foo.entity.file_path, PathBuf::from("main.lua"));

    // The table-field entity is indexed under the field name
    let field = results
        .iter()
        .find(|r| r.entity.name == "f")
        .expect("table field entity should be retrievable");
    assert_eq!(field.entity.kind, EntityKind::Table);
}

#[tokio::test]
async fn reingest_is_idempotent_in_the_graph() {
    let repo = tempfile::tempdir().unwrap();
    fs::write(repo.path().join("main.lua"), "function foo() bar() end\n").unwrap();

    let stores = tempfile::tempdir().unwrap();
    let graph = GraphStore::open(&stores.path().join("graph.db")).unwrap();
    let vector = VectorStore::open(&stores.path().join("vectors.db"), 2).unwrap();
    let writer = DualStoreWriter::new(graph.clone(), vector.clone());

    let files = walk_lua_repo(repo.path()).unwrap();
    let entry_points = vec!["main.lua".to_string()];
    for _ in 0..2 {
        process_repository(&files, &entry_points, &StubEmbedder, &writer)
            .await
            .unwrap();
    }

    // foo plus the bar stub; the second run overwrote, not duplicated
    assert_eq!(graph.entity_count().unwrap(), 2);
    // The vector store is an append-only log: placeholder plus one foo
    // record per run
    assert_eq!(vector.record_count().unwrap(), 3);
}
