use std::path::PathBuf;

/// Errors that can occur across the luascope pipeline.
///
/// Each variant wraps a specific failure domain. Library crates use this
/// type directly; deriving [`miette::Diagnostic`] lets the binary crate
/// bubble it into `miette::Result` with `?`. None of these are retried
/// internally — they propagate to the immediate caller.
///
/// # Examples
///
/// ```
/// use luascope_core::LuascopeError;
///
/// let err = LuascopeError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LuascopeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catastrophic parser failure. The Lua grammar is error-tolerant, so
    /// malformed-but-tokenizable input never produces this.
    #[error("parse error: {0}")]
    Parse(String),

    /// Embedding provider call error or empty result.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Embedding response length did not match the request length.
    ///
    /// Data-integrity guard: vectors are never zipped short onto entities.
    #[error("embedding count mismatch: requested {expected} texts, received {received} vectors")]
    EmbeddingMismatch {
        /// Number of texts sent to the provider.
        expected: usize,
        /// Number of vectors the provider returned.
        received: usize,
    },

    /// A backend write failed. The other backend is not rolled back.
    #[error("store write error: {0}")]
    StoreWrite(String),

    /// A backend read failed at search time.
    #[error("store read error: {0}")]
    StoreRead(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LuascopeError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = LuascopeError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn mismatch_reports_both_counts() {
        let err = LuascopeError::EmbeddingMismatch {
            expected: 3,
            received: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn converts_into_miette_report() {
        let err = LuascopeError::Config("bad value".into());
        let report: miette::Report = err.into();
        assert!(report.to_string().contains("bad value"));
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = LuascopeError::FileNotFound(PathBuf::from("/tmp/missing.lua"));
        assert!(err.to_string().contains("/tmp/missing.lua"));
    }
}
