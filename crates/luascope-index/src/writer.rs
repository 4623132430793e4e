//! Dual-store persistence: graph first, then vectors.
//!
//! The two stores are written independently with no cross-store
//! transaction. If the vector write fails after the graph write
//! succeeded, the graph keeps its rows; the error propagates and the
//! caller decides whether to re-ingest.

use luascope_core::{CodeEntity, LuascopeError};

use crate::graph::GraphStore;
use crate::vector::VectorStore;

/// Writes embedded entities to both stores.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use luascope_index::graph::GraphStore;
/// use luascope_index::vector::VectorStore;
/// use luascope_index::writer::DualStoreWriter;
///
/// let graph = GraphStore::open(Path::new(".luascope/graph.db")).unwrap();
/// let vector = VectorStore::open(Path::new(".luascope/vectors.db"), 1536).unwrap();
/// let writer = DualStoreWriter::new(graph, vector);
/// writer.persist(&[]).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DualStoreWriter {
    graph: GraphStore,
    vector: VectorStore,
}

impl DualStoreWriter {
    /// Pair a graph store with a vector store.
    pub fn new(graph: GraphStore, vector: VectorStore) -> Self {
        Self { graph, vector }
    }

    /// The graph half of the pair.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// The vector half of the pair.
    pub fn vector(&self) -> &VectorStore {
        &self.vector
    }

    /// Persist entities to the graph, then to the vector store.
    ///
    /// An empty batch still readies the vector store, so ingesting a
    /// repository with no entities leaves a searchable (placeholder-only)
    /// index rather than a missing table.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreWrite`] from whichever store failed
    /// first. No rollback is attempted.
    pub fn persist(&self, entities: &[CodeEntity]) -> Result<(), LuascopeError> {
        self.graph.upsert_entities(entities)?;
        self.vector.ensure_ready()?;
        self.vector.append(entities)?;
        Ok(())
    }
}
