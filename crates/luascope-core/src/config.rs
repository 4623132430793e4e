use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LuascopeError;

/// Top-level configuration loaded from `.luascope.toml`.
///
/// # Examples
///
/// ```
/// use luascope_core::LuascopeConfig;
///
/// let config = LuascopeConfig::default();
/// assert_eq!(config.embedding.model, "voyage-code-3");
/// assert_eq!(config.embedding.dimensions, 1536);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LuascopeConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Ingest pipeline settings.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Backing store locations.
    #[serde(default)]
    pub store: StoreConfig,
}

impl LuascopeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Io`] if the file cannot be read, or
    /// [`LuascopeError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use luascope_core::LuascopeConfig;
    /// use std::path::Path;
    ///
    /// let config = LuascopeConfig::from_file(Path::new(".luascope.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LuascopeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use luascope_core::LuascopeConfig;
    ///
    /// let toml = r#"
    /// [embedding]
    /// dimensions = 1536
    /// "#;
    /// let config = LuascopeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.embedding.dimensions, 1536);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LuascopeError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Configuration for the embedding provider.
///
/// The vector dimension must stay in lock-step with the model across both
/// backing stores.
///
/// # Examples
///
/// ```
/// use luascope_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "voyage");
/// assert_eq!(config.dimensions, 1536);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider (default: `"voyage"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// API key for the embedding provider.
    pub api_key: Option<String>,
    /// Model name (default: `"voyage-code-3"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimensions (default: 1536).
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "voyage".into()
}

fn default_embedding_model() -> String {
    "voyage-code-3".into()
}

fn default_embedding_dimensions() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

/// Ingest pipeline configuration.
///
/// # Examples
///
/// ```
/// use luascope_core::IngestConfig;
///
/// let config = IngestConfig::default();
/// assert_eq!(config.entry_points.len(), 4);
/// assert_eq!(config.entry_points[0], "main.lua");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Entry-point files seeding the reachability filter.
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<String>,
}

fn default_entry_points() -> Vec<String> {
    vec![
        "main.lua".into(),
        "_api/core.lua".into(),
        "_api/game_object.lua".into(),
        "_api/menu.lua".into(),
    ]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            entry_points: default_entry_points(),
        }
    }
}

/// Locations of the two backing stores.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use luascope_core::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.graph_path, Path::new(".luascope/graph.db"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Property-graph store database path.
    #[serde(default = "default_graph_path")]
    pub graph_path: PathBuf,
    /// Flat vector store database path.
    #[serde(default = "default_vector_path")]
    pub vector_path: PathBuf,
}

fn default_graph_path() -> PathBuf {
    PathBuf::from(".luascope/graph.db")
}

fn default_vector_path() -> PathBuf {
    PathBuf::from(".luascope/vectors.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            graph_path: default_graph_path(),
            vector_path: default_vector_path(),
        }
    }
}
