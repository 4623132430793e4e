//! Core types, configuration, and error handling for luascope.
//!
//! This crate provides the shared foundation used by the other luascope
//! crates:
//! - [`LuascopeError`] — unified error type using `thiserror`
//! - [`LuascopeConfig`] — configuration loaded from `.luascope.toml`
//! - Shared types: [`CodeEntity`], [`EntityKind`], [`SearchResult`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{EmbeddingConfig, IngestConfig, LuascopeConfig, StoreConfig};
pub use error::LuascopeError;
pub use types::{CodeEntity, EntityKind, OutputFormat, SearchResult};

/// A convenience `Result` type for luascope operations.
pub type Result<T> = std::result::Result<T, LuascopeError>;
