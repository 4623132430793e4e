//! SQLite-backed dependency graph store.
//!
//! Entities are nodes keyed by name; `DEPENDS_ON` edges link an entity to
//! the names it calls. The raw call list is also stored on the node
//! itself, insertion order and duplicates intact, separate from the
//! deduplicated edge set. Writes are merge-by-name upserts: re-ingesting
//! a repository overwrites scalar fields in place, and two entities
//! sharing a name collapse into one node, last writer winning. Dependency
//! targets that were never defined anywhere exist as name-only stub nodes
//! so edges always have both endpoints.
//!
//! The store holds only a path; each call opens its own connection, so
//! the handle is cheap to clone across threads.

use std::path::{Path, PathBuf};

use luascope_core::{CodeEntity, EntityKind, LuascopeError, SearchResult};
use rusqlite::{params, Connection};

use crate::similarity::{bytes_to_floats, cosine_similarity, floats_to_bytes};

/// Dependency graph store over SQLite.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use luascope_index::graph::GraphStore;
///
/// let store = GraphStore::open(Path::new(".luascope/graph.db")).unwrap();
/// assert_eq!(store.entity_count().unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
}

impl GraphStore {
    /// Open or create the graph database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreWrite`] if the database cannot be
    /// created or the schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self, LuascopeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LuascopeError::StoreWrite(format!("failed to create graph store directory: {e}"))
            })?;
        }

        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store
            .connect()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to open graph store: {e}")))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                name TEXT PRIMARY KEY,
                kind TEXT,
                content TEXT,
                file_path TEXT,
                start_line INTEGER,
                end_line INTEGER,
                dependencies TEXT,
                vector BLOB
            );

            CREATE TABLE IF NOT EXISTS depends_on (
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                PRIMARY KEY (source, target)
            );
            ",
        )
        .map_err(|e| LuascopeError::StoreWrite(format!("failed to create graph schema: {e}")))?;

        Ok(store)
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open(&self.path)
    }

    /// Upsert entities and their dependency edges in one transaction.
    ///
    /// Each dependency target is merged as a stub node (name only) if no
    /// full entity with that name exists yet; a later full upsert fills
    /// the stub in. There is no delete path.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreWrite`] on any statement failure and
    /// [`LuascopeError::Serialization`] if the call list cannot be
    /// encoded.
    pub fn upsert_entities(&self, entities: &[CodeEntity]) -> Result<(), LuascopeError> {
        let mut conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to open graph store: {e}")))?;
        let tx = conn
            .transaction()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to begin transaction: {e}")))?;

        for entity in entities {
            let vector_bytes = entity.vector.as_ref().map(|v| floats_to_bytes(v));
            let dependencies = serde_json::to_string(&entity.dependencies)?;
            tx.execute(
                "INSERT INTO entities (name, kind, content, file_path, start_line, end_line, dependencies, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(name) DO UPDATE SET
                     kind = excluded.kind,
                     content = excluded.content,
                     file_path = excluded.file_path,
                     start_line = excluded.start_line,
                     end_line = excluded.end_line,
                     dependencies = excluded.dependencies,
                     vector = excluded.vector",
                params![
                    entity.name,
                    entity.kind.to_string(),
                    entity.content,
                    entity.file_path.to_string_lossy().to_string(),
                    entity.start_line as i64,
                    entity.end_line as i64,
                    dependencies,
                    vector_bytes,
                ],
            )
            .map_err(|e| {
                LuascopeError::StoreWrite(format!(
                    "failed to upsert entity '{}': {e}",
                    entity.name
                ))
            })?;

            for target in &entity.dependencies {
                tx.execute(
                    "INSERT INTO entities (name) VALUES (?1)
                     ON CONFLICT(name) DO NOTHING",
                    params![target],
                )
                .map_err(|e| {
                    LuascopeError::StoreWrite(format!(
                        "failed to merge stub node '{target}': {e}"
                    ))
                })?;

                tx.execute(
                    "INSERT OR IGNORE INTO depends_on (source, target) VALUES (?1, ?2)",
                    params![entity.name, target],
                )
                .map_err(|e| {
                    LuascopeError::StoreWrite(format!(
                        "failed to insert edge '{}' -> '{target}': {e}",
                        entity.name
                    ))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to commit: {e}")))?;
        Ok(())
    }

    /// Vector similarity search over fully-stored entities.
    ///
    /// Stub nodes have no vector and never match. Each hit carries the
    /// entity's outgoing edge targets; the entity itself keeps its
    /// recorded raw call list.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreRead`] on query failure.
    pub fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, LuascopeError> {
        let conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreRead(format!("failed to open graph store: {e}")))?;

        let mut stmt = conn
            .prepare(
                "SELECT name, kind, content, file_path, start_line, end_line, dependencies, vector
                 FROM entities WHERE vector IS NOT NULL",
            )
            .map_err(|e| LuascopeError::StoreRead(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let vector_bytes: Vec<u8> = row.get(7)?;
                let score = cosine_similarity(query_vector, &bytes_to_floats(&vector_bytes));

                let kind: String = row.get::<_, Option<String>>(1)?.unwrap_or_default();
                let dependencies_json =
                    row.get::<_, Option<String>>(6)?.unwrap_or_default();
                let entity = CodeEntity {
                    kind: kind.parse().unwrap_or(EntityKind::Function),
                    name: row.get(0)?,
                    content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    file_path: PathBuf::from(
                        row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    ),
                    start_line: row.get::<_, Option<i64>>(4)?.unwrap_or_default() as usize,
                    end_line: row.get::<_, Option<i64>>(5)?.unwrap_or_default() as usize,
                    dependencies: serde_json::from_str(&dependencies_json).unwrap_or_default(),
                    vector: None,
                };
                Ok((score, entity))
            })
            .map_err(|e| LuascopeError::StoreRead(format!("failed to query entities: {e}")))?;

        let mut scored = Vec::new();
        for row in rows {
            let (score, entity) =
                row.map_err(|e| LuascopeError::StoreRead(format!("failed to read row: {e}")))?;
            scored.push((score, entity));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut hits = Vec::with_capacity(scored.len());
        for (score, entity) in scored {
            let dependencies = self.dependencies_of(&conn, &entity.name)?;
            hits.push(SearchResult {
                entity,
                score,
                dependencies,
            });
        }

        Ok(hits)
    }

    fn dependencies_of(
        &self,
        conn: &Connection,
        name: &str,
    ) -> Result<Vec<String>, LuascopeError> {
        let mut stmt = conn
            .prepare("SELECT target FROM depends_on WHERE source = ?1 ORDER BY target")
            .map_err(|e| LuascopeError::StoreRead(format!("failed to prepare edge query: {e}")))?;

        let rows = stmt
            .query_map(params![name], |row| row.get(0))
            .map_err(|e| LuascopeError::StoreRead(format!("failed to query edges: {e}")))?;

        let mut targets = Vec::new();
        for row in rows {
            targets.push(
                row.map_err(|e| LuascopeError::StoreRead(format!("failed to read edge: {e}")))?,
            );
        }
        Ok(targets)
    }

    /// Total node count, stub nodes included.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreRead`] on query failure.
    pub fn entity_count(&self) -> Result<usize, LuascopeError> {
        let conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreRead(format!("failed to open graph store: {e}")))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))
            .map_err(|e| LuascopeError::StoreRead(format!("failed to count entities: {e}")))?;
        Ok(count as usize)
    }
}
