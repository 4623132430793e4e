//! SQLite-backed vector store.
//!
//! An append-only log of embedded entity records. The first write to an
//! empty store bootstraps it with a single placeholder record (name and
//! kind `"sample"`, zero vector) so the table always has at least one row
//! to search against; the placeholder scores 0.0 against every query and
//! only surfaces when there is almost nothing else to return.

use std::path::{Path, PathBuf};

use luascope_core::{CodeEntity, EntityKind, LuascopeError, SearchResult};
use rusqlite::{params, Connection};

use crate::similarity::{bytes_to_floats, cosine_similarity, floats_to_bytes};

const PLACEHOLDER_NAME: &str = "sample";

/// Vector similarity store over SQLite.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use luascope_index::vector::VectorStore;
///
/// let store = VectorStore::open(Path::new(".luascope/vectors.db"), 1536).unwrap();
/// store.ensure_ready().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
    dimensions: usize,
}

impl VectorStore {
    /// Open or create the vector database at the given path.
    ///
    /// `dimensions` sizes the placeholder record's zero vector.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreWrite`] if the database cannot be
    /// created or the schema cannot be applied.
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, LuascopeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LuascopeError::StoreWrite(format!("failed to create vector store directory: {e}"))
            })?;
        }

        let store = Self {
            path: path.to_path_buf(),
            dimensions,
        };
        let conn = store
            .connect()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to open vector store: {e}")))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                dependencies TEXT NOT NULL,
                vector BLOB NOT NULL
            );
            ",
        )
        .map_err(|e| LuascopeError::StoreWrite(format!("failed to create vector schema: {e}")))?;

        Ok(store)
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open(&self.path)
    }

    /// Bootstrap an empty store with the placeholder record.
    ///
    /// A store that already has rows is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreWrite`] on insert failure.
    pub fn ensure_ready(&self) -> Result<(), LuascopeError> {
        let conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to open vector store: {e}")))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to count records: {e}")))?;
        if count > 0 {
            return Ok(());
        }

        conn.execute(
            "INSERT INTO records
             (name, kind, content, file_path, start_line, end_line, dependencies, vector)
             VALUES (?1, ?2, '', '', 0, 0, '[]', ?3)",
            params![
                PLACEHOLDER_NAME,
                PLACEHOLDER_NAME,
                floats_to_bytes(&vec![0.0f32; self.dimensions]),
            ],
        )
        .map_err(|e| {
            LuascopeError::StoreWrite(format!("failed to insert placeholder record: {e}"))
        })?;
        Ok(())
    }

    /// Append embedded entity records.
    ///
    /// Every entity must already carry a vector; the writer runs the
    /// embedding gate before this point, so a missing vector is a
    /// contract violation, not a skippable row.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreWrite`] if an entity has no vector
    /// or an insert fails.
    pub fn append(&self, entities: &[CodeEntity]) -> Result<(), LuascopeError> {
        let mut conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to open vector store: {e}")))?;
        let tx = conn
            .transaction()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to begin transaction: {e}")))?;

        for entity in entities {
            let Some(vector) = &entity.vector else {
                return Err(LuascopeError::StoreWrite(format!(
                    "entity '{}' has no embedding vector",
                    entity.name
                )));
            };
            let dependencies = serde_json::to_string(&entity.dependencies)?;

            tx.execute(
                "INSERT INTO records
                 (name, kind, content, file_path, start_line, end_line, dependencies, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entity.name,
                    entity.kind.to_string(),
                    entity.content,
                    entity.file_path.to_string_lossy().to_string(),
                    entity.start_line as i64,
                    entity.end_line as i64,
                    dependencies,
                    floats_to_bytes(vector),
                ],
            )
            .map_err(|e| {
                LuascopeError::StoreWrite(format!(
                    "failed to append record '{}': {e}",
                    entity.name
                ))
            })?;
        }

        tx.commit()
            .map_err(|e| LuascopeError::StoreWrite(format!("failed to commit: {e}")))?;
        Ok(())
    }

    /// Vector similarity search over all records.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreRead`] on query failure.
    pub fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, LuascopeError> {
        let conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreRead(format!("failed to open vector store: {e}")))?;

        let mut stmt = conn
            .prepare(
                "SELECT name, kind, content, file_path, start_line, end_line, dependencies, vector
                 FROM records",
            )
            .map_err(|e| LuascopeError::StoreRead(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let vector_bytes: Vec<u8> = row.get(7)?;
                let score = cosine_similarity(query_vector, &bytes_to_floats(&vector_bytes));

                let kind: String = row.get(1)?;
                let dependencies_json: String = row.get(6)?;
                let dependencies: Vec<String> =
                    serde_json::from_str(&dependencies_json).unwrap_or_default();

                let entity = CodeEntity {
                    kind: kind.parse().unwrap_or(EntityKind::Function),
                    name: row.get(0)?,
                    content: row.get(2)?,
                    file_path: PathBuf::from(row.get::<_, String>(3)?),
                    start_line: row.get::<_, i64>(4)? as usize,
                    end_line: row.get::<_, i64>(5)? as usize,
                    dependencies: dependencies.clone(),
                    vector: None,
                };
                Ok((score, entity, dependencies))
            })
            .map_err(|e| LuascopeError::StoreRead(format!("failed to query records: {e}")))?;

        let mut scored = Vec::new();
        for row in rows {
            let (score, entity, dependencies) =
                row.map_err(|e| LuascopeError::StoreRead(format!("failed to read row: {e}")))?;
            scored.push(SearchResult {
                entity,
                score,
                dependencies,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// Total record count, placeholder included.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::StoreRead`] on query failure.
    pub fn record_count(&self) -> Result<usize, LuascopeError> {
        let conn = self
            .connect()
            .map_err(|e| LuascopeError::StoreRead(format!("failed to open vector store: {e}")))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(|e| LuascopeError::StoreRead(format!("failed to count records: {e}")))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, vector: Option<Vec<f32>>) -> CodeEntity {
        CodeEntity {
            kind: EntityKind::Function,
            name: name.to_string(),
            content: format!("function {name}() end"),
            file_path: PathBuf::from("a.lua"),
            start_line: 0,
            end_line: 0,
            dependencies: vec!["helper".to_string()],
            vector,
        }
    }

    fn temp_store(dimensions: usize) -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(&dir.path().join("vectors.db"), dimensions).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_store_bootstraps_placeholder_once() {
        let (_dir, store) = temp_store(4);
        store.ensure_ready().unwrap();
        store.ensure_ready().unwrap();
        assert_eq!(store.record_count().unwrap(), 1);

        let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity.name, PLACEHOLDER_NAME);
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn populated_store_is_not_bootstrapped() {
        let (_dir, store) = temp_store(2);
        store
            .append(&[entity("foo", Some(vec![1.0, 0.0]))])
            .unwrap();
        store.ensure_ready().unwrap();

        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn append_rejects_entity_without_vector() {
        let (_dir, store) = temp_store(2);
        let err = store.append(&[entity("foo", None)]).unwrap_err();
        assert!(matches!(err, LuascopeError::StoreWrite(_)));
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn search_ranks_by_similarity() {
        let (_dir, store) = temp_store(2);
        store
            .append(&[
                entity("close", Some(vec![1.0, 0.0])),
                entity("far", Some(vec![0.0, 1.0])),
            ])
            .unwrap();

        let hits = store.search(&[0.9, 0.1], 5).unwrap();
        assert_eq!(hits[0].entity.name, "close");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn search_restores_dependencies() {
        let (_dir, store) = temp_store(2);
        store
            .append(&[entity("foo", Some(vec![1.0, 0.0]))])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].dependencies, vec!["helper"]);
        assert_eq!(hits[0].entity.dependencies, vec!["helper"]);
    }

    #[test]
    fn search_respects_limit() {
        let (_dir, store) = temp_store(2);
        let entities: Vec<CodeEntity> = (0..8)
            .map(|i| entity(&format!("f{i}"), Some(vec![1.0, i as f32])))
            .collect();
        store.append(&entities).unwrap();

        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
    }
}
