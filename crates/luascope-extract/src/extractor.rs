//! Entity extraction: one pass over a file's capture stream.
//!
//! Captures are folded through an explicit two-state machine. A
//! `definition.*` capture seals the open entity (if any) and opens a new
//! one; a `reference.call` capture appends a dependency to the open
//! entity. The model is deliberately flat: a nested definition seals and
//! replaces its enclosing one, so calls appearing after the nested
//! definition attach to it, not the outer definition. This flattening is
//! preserved compatibility behavior, not an oversight.

use std::path::Path;

use luascope_core::{CodeEntity, EntityKind, LuascopeError};
use tree_sitter::Node;

use crate::query::{parse, Capture, StructuralQuery};

/// Extractor state: either between entities or accumulating one.
enum ExtractorState {
    /// No entity is open; calls seen here are dropped.
    Idle,
    /// An entity is open and collecting dependencies.
    Accumulating(CodeEntity),
}

impl ExtractorState {
    /// Seal the open entity into `out`, leaving the state idle.
    fn seal(&mut self, out: &mut Vec<CodeEntity>) {
        if let ExtractorState::Accumulating(entity) = std::mem::replace(self, ExtractorState::Idle)
        {
            out.push(entity);
        }
    }
}

/// Extracts [`CodeEntity`] values from Lua source files.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use luascope_extract::extractor::EntityExtractor;
///
/// let extractor = EntityExtractor::new().unwrap();
/// let entities = extractor
///     .extract(Path::new("a.lua"), "function foo() bar() end")
///     .unwrap();
/// assert_eq!(entities.len(), 1);
/// assert_eq!(entities[0].name, "foo");
/// assert_eq!(entities[0].dependencies, vec!["bar"]);
/// ```
pub struct EntityExtractor {
    query: StructuralQuery,
}

impl EntityExtractor {
    /// Create an extractor with the compiled extraction query.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Parse`] if the query fails to compile.
    pub fn new() -> Result<Self, LuascopeError> {
        Ok(Self {
            query: StructuralQuery::standard()?,
        })
    }

    /// Extract all entities from one file, in document order.
    ///
    /// Entities are emitted without vectors; the embedding gate attaches
    /// those later. Calls occurring outside any open entity are silently
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Parse`] on catastrophic parser failure.
    pub fn extract(&self, file_path: &Path, source: &str) -> Result<Vec<CodeEntity>, LuascopeError> {
        let tree = parse(source)?;
        let captures = self.query.captures(tree.root_node(), source.as_bytes());

        let mut entities = Vec::new();
        let mut state = ExtractorState::Idle;

        for Capture { label, node } in captures {
            if label.starts_with("definition") {
                state.seal(&mut entities);
                state = ExtractorState::Accumulating(CodeEntity {
                    kind: entity_kind_for(label),
                    name: node_name(node, source),
                    content: node_text(node, source).to_string(),
                    file_path: file_path.to_path_buf(),
                    start_line: node.start_position().row,
                    end_line: node.end_position().row,
                    dependencies: Vec::new(),
                    vector: None,
                });
            } else if label == "reference.call" {
                if let ExtractorState::Accumulating(entity) = &mut state {
                    entity.dependencies.push(dependency_name(node, source));
                }
            }
        }

        state.seal(&mut entities);
        Ok(entities)
    }
}

/// Map a definition capture label to an entity kind.
///
/// Unrecognized `definition.*` labels (e.g. the preview query's
/// `definition.as`) fall back to `function` — a lenient default, not an
/// error.
fn entity_kind_for(label: &str) -> EntityKind {
    match label {
        "definition.function" => EntityKind::Function,
        "definition.method" => EntityKind::Method,
        "definition.table" => EntityKind::Table,
        _ => EntityKind::Function,
    }
}

/// Name from the definition node's `name` child field, or `"anonymous"`.
fn node_name(node: Node<'_>, source: &str) -> String {
    match node.child_by_field_name("name") {
        Some(name_node) => node_text(name_node, source).to_string(),
        None => "anonymous".to_string(),
    }
}

/// Dependency name for a call: the call target's first dotted segment.
fn dependency_name(node: Node<'_>, source: &str) -> String {
    let target = match node.child_by_field_name("name") {
        Some(name_node) => node_text(name_node, source),
        None => node_text(node, source),
    };
    target.split('.').next().unwrap_or(target).to_string()
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}
