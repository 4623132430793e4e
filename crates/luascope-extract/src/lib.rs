//! Lua source discovery and structural extraction for luascope.
//!
//! The ingestion front half lives here:
//! - [`walker`] — repository walking, `.gitignore`-aware, `.lua` only
//! - [`query`] — tree-sitter grammar, structural queries, capture streams
//! - [`extractor`] — the definition/call accumulator producing [`CodeEntity`]s
//! - [`annotations`] — LuaLS annotation expansion for API stub files
//! - [`resolver`] — repo map and entry-point reachability filtering
//!
//! [`CodeEntity`]: luascope_core::CodeEntity

pub mod annotations;
pub mod extractor;
pub mod query;
pub mod resolver;
pub mod walker;
