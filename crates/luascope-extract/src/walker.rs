use std::path::{Path, PathBuf};

use luascope_core::LuascopeError;

/// Maximum file size to process (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// A Lua source file discovered during repository walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use luascope_extract::walker::SourceFile;
///
/// let file = SourceFile {
///     path: PathBuf::from("main.lua"),
///     content: "function main() end".to_string(),
/// };
/// assert_eq!(file.path, PathBuf::from("main.lua"));
/// ```
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Full file content.
    pub content: String,
}

/// Walk a repository, respecting `.gitignore`, returning `.lua` source files.
///
/// Skips binary files and files larger than 1 MB. Returned paths are
/// relative to `root`.
///
/// # Errors
///
/// Returns [`LuascopeError::FileNotFound`] if `root` does not exist.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use luascope_extract::walker::walk_lua_repo;
///
/// let files = walk_lua_repo(Path::new(".")).unwrap();
/// for f in &files {
///     println!("{}", f.path.display());
/// }
/// ```
pub fn walk_lua_repo(root: &Path) -> Result<Vec<SourceFile>, LuascopeError> {
    if !root.exists() {
        return Err(LuascopeError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("lua") {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.len() > MAX_FILE_SIZE {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => continue,
        };

        // Binary detection: null bytes in the first 8KB
        let check_len = content.len().min(BINARY_CHECK_SIZE);
        if content.as_bytes()[..check_len].contains(&0) {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        files.push(SourceFile {
            path: relative,
            content,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
