//! Syntax parser adapter for the Lua grammar.
//!
//! Wraps tree-sitter parsing and the structural pattern queries whose
//! captures drive entity extraction. Capture labels follow the
//! `definition.<kind>` / `reference.call` convention; `@name` captures
//! exist for the query engine's benefit and are ignored downstream (name
//! extraction goes through the definition node's `name` field).

use luascope_core::LuascopeError;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

/// The extraction query: function, method, and table-field definitions
/// plus call expressions.
const STANDARD_QUERY: &str = r#"
(function_declaration
  name: [
    (identifier) @name
    (dot_index_expression field: (identifier) @name)
  ]) @definition.function

(function_declaration
  name: (method_index_expression
    method: (identifier) @name)) @definition.method

(table_constructor
  (field
    name: (identifier) @name
    value: (function_definition)) @definition.table)

(function_call
  name: [
    (identifier) @name
    (dot_index_expression field: (identifier) @name)
    (method_index_expression method: (identifier) @name)
  ]) @reference.call
"#;

/// The preview query: everything in the standard query plus assignment
/// forms of function and table definitions.
const EXTENDED_QUERY: &str = r#"
(function_declaration
  name: [
    (identifier) @name
    (dot_index_expression field: (identifier) @name)
  ]) @definition.function

(function_declaration
  name: (method_index_expression
    method: (identifier) @name)) @definition.method

(assignment_statement
  (variable_list .
    name: [
      (identifier) @name
      (dot_index_expression field: (identifier) @name)
    ])
  (expression_list .
    value: (function_definition))) @definition.as

(table_constructor
  (field
    name: (identifier) @name
    value: (function_definition)) @definition.table)

(function_call
  name: [
    (identifier) @name
    (dot_index_expression field: (identifier) @name)
    (method_index_expression method: (identifier) @name)
  ]) @reference.call

(assignment_statement
  (expression_list
    (table_constructor))) @definition.table-assignment
"#;

/// The Lua grammar.
pub fn lua_language() -> Language {
    tree_sitter_lua::LANGUAGE.into()
}

/// Parse Lua source text into a syntax tree.
///
/// The grammar is error-tolerant: malformed-but-tokenizable input yields a
/// best-effort tree, not an error.
///
/// # Errors
///
/// Returns [`LuascopeError::Parse`] only on catastrophic parser failure.
///
/// # Examples
///
/// ```
/// use luascope_extract::query::parse;
///
/// let tree = parse("function foo() end").unwrap();
/// assert_eq!(tree.root_node().kind(), "chunk");
/// ```
pub fn parse(source: &str) -> Result<Tree, LuascopeError> {
    let mut parser = Parser::new();
    parser
        .set_language(&lua_language())
        .map_err(|e| LuascopeError::Parse(format!("failed to load Lua grammar: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| LuascopeError::Parse("parser produced no tree".into()))
}

/// One capture yielded by a structural query: a labeled syntax node.
#[derive(Debug, Clone, Copy)]
pub struct Capture<'q, 't> {
    /// The capture label (`definition.function`, `reference.call`, `name`, ...).
    pub label: &'q str,
    /// The captured node.
    pub node: Node<'t>,
}

/// A compiled structural pattern query over the Lua grammar.
///
/// # Examples
///
/// ```
/// use luascope_extract::query::{parse, StructuralQuery};
///
/// let query = StructuralQuery::standard().unwrap();
/// let source = "function foo() bar() end";
/// let tree = parse(source).unwrap();
/// let captures = query.captures(tree.root_node(), source.as_bytes());
/// assert!(captures.iter().any(|c| c.label == "definition.function"));
/// assert!(captures.iter().any(|c| c.label == "reference.call"));
/// ```
pub struct StructuralQuery {
    query: Query,
}

impl StructuralQuery {
    /// Compile the extraction query used by the entity extractor.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Parse`] if the query does not compile
    /// against the grammar.
    pub fn standard() -> Result<Self, LuascopeError> {
        Self::compile(STANDARD_QUERY)
    }

    /// Compile the preview query used by the repo-map pipeline.
    ///
    /// Matches additional definition forms (`definition.as`,
    /// `definition.table-assignment`) that the extraction query ignores.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Parse`] if the query does not compile
    /// against the grammar.
    pub fn extended() -> Result<Self, LuascopeError> {
        Self::compile(EXTENDED_QUERY)
    }

    fn compile(source: &str) -> Result<Self, LuascopeError> {
        let query = Query::new(&lua_language(), source)
            .map_err(|e| LuascopeError::Parse(format!("invalid structural query: {e}")))?;
        Ok(Self { query })
    }

    /// Run the query and collect all captures in document order.
    ///
    /// Document order is load-bearing: the extractor's accumulator
    /// semantics depend on definitions and calls arriving in the order
    /// they appear in source.
    pub fn captures<'q, 't>(&'q self, root: Node<'t>, source: &[u8]) -> Vec<Capture<'q, 't>> {
        let names = self.query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut iter = cursor.captures(&self.query, root, source);

        let mut out = Vec::new();
        while let Some((query_match, capture_index)) = iter.next() {
            let capture = query_match.captures[*capture_index];
            out.push(Capture {
                label: names[capture.index as usize],
                node: capture.node,
            });
        }
        out
    }
}
