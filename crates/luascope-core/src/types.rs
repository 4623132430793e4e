use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Structural kind of an extracted code entity.
///
/// Assigned exactly once at creation from the matched query pattern.
///
/// # Examples
///
/// ```
/// use luascope_core::EntityKind;
///
/// let k: EntityKind = serde_json::from_str("\"method\"").unwrap();
/// assert_eq!(k, EntityKind::Method);
/// assert_eq!(EntityKind::Table.to_string(), "table");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A standalone or dot-indexed function declaration.
    Function,
    /// A method declaration (`function obj:name() ... end`).
    Method,
    /// A function-valued field in a table constructor.
    Table,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Function => write!(f, "function"),
            EntityKind::Method => write!(f, "method"),
            EntityKind::Table => write!(f, "table"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "function" => Ok(EntityKind::Function),
            "method" => Ok(EntityKind::Method),
            "table" => Ok(EntityKind::Table),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// One extracted structural code unit: the unit of extraction and retrieval.
///
/// Created by the entity extractor for one parse pass over one file,
/// enriched with a vector by the embedding gate, then written once to both
/// stores. Never mutated after persistence — re-processing a file produces
/// new records.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use luascope_core::{CodeEntity, EntityKind};
///
/// let entity = CodeEntity {
///     kind: EntityKind::Function,
///     name: "foo".into(),
///     content: "function foo() end".into(),
///     file_path: PathBuf::from("a.lua"),
///     start_line: 0,
///     end_line: 0,
///     dependencies: vec![],
///     vector: None,
/// };
/// assert_eq!(entity.name, "foo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntity {
    /// Structural kind, from the matched definition pattern.
    pub kind: EntityKind,
    /// Extracted identifier; `"anonymous"` if none was found structurally.
    pub name: String,
    /// Verbatim source text spanning the entity's syntax node.
    pub content: String,
    /// Path relative to the scanned root; immutable after creation.
    pub file_path: PathBuf,
    /// Zero-based first source line (tree-sitter row).
    pub start_line: usize,
    /// Zero-based last source line (tree-sitter row).
    pub end_line: usize,
    /// Raw call-target names in order of appearance; duplicates allowed.
    pub dependencies: Vec<String>,
    /// Fixed-dimension embedding; absent until the embedding gate runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// A result from hybrid code search. Produced by the retriever, never
/// persisted.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use luascope_core::{CodeEntity, EntityKind, SearchResult};
///
/// let result = SearchResult {
///     entity: CodeEntity {
///         kind: EntityKind::Function,
///         name: "foo".into(),
///         content: "function foo() end".into(),
///         file_path: PathBuf::from("a.lua"),
///         start_line: 0,
///         end_line: 0,
///         dependencies: vec!["bar".into()],
///         vector: None,
///     },
///     score: 0.92,
///     dependencies: vec!["bar".into()],
/// };
/// assert!(result.score > 0.9);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The matched entity (vector omitted).
    pub entity: CodeEntity,
    /// Relevance score from the contributing backend.
    pub score: f64,
    /// Dependency names reported by the contributing backend: the
    /// deduplicated `DEPENDS_ON` edge targets for graph hits, the
    /// recorded call list for vector hits.
    pub dependencies: Vec<String>,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument
/// parsing.
///
/// # Examples
///
/// ```
/// use luascope_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
