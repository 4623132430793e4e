//! Repo map construction and reachability filtering.
//!
//! The repo map records every structural capture per file, using the
//! extended query so assignment-form definitions show up too. The filter
//! then keeps only files reachable from the fixed entry points by
//! following `require("...")` references, rewriting legacy `common/`
//! module paths into their `_api/common/` location along the way.

use std::collections::{BTreeMap, BTreeSet};

use luascope_core::LuascopeError;

use crate::annotations::expand_api_annotations;
use crate::query::{parse, StructuralQuery};
use crate::walker::SourceFile;

/// One structural capture recorded in the repo map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCapture {
    /// Capture label (`definition.function`, `reference.call`, ...).
    pub label: String,
    /// Verbatim source text of the captured node.
    pub text: String,
}

/// Per-file capture listing, keyed by repo-relative path.
pub type RepoMap = BTreeMap<String, Vec<FileCapture>>;

/// Build the repo map: every file's captures under the extended query.
///
/// Files under `_api/common/` get their LuaLS annotations expanded into
/// stub declarations before parsing, so annotation-only API files still
/// contribute definitions.
///
/// # Errors
///
/// Returns [`LuascopeError::Parse`] if the query fails to compile or the
/// parser fails outright.
pub fn build_repo_map(files: &[SourceFile]) -> Result<RepoMap, LuascopeError> {
    let query = StructuralQuery::extended()?;
    let mut map = RepoMap::new();

    for file in files {
        let path = file.path.to_string_lossy().to_string();
        let content = if path.contains("_api/common") {
            expand_api_annotations(&file.content)
        } else {
            file.content.clone()
        };

        let tree = parse(&content)?;
        let captures = query
            .captures(tree.root_node(), content.as_bytes())
            .into_iter()
            .map(|c| FileCapture {
                label: c.label.to_string(),
                text: content[c.node.byte_range()].to_string(),
            })
            .collect();

        map.insert(path, captures);
    }

    Ok(map)
}

/// Rewrite a `require("...")` capture into the repo-relative file path it
/// loads, or `None` if the text is not a simple string require.
///
/// Modules under `common/` are mapped to their actual `_api/common/`
/// location.
///
/// # Examples
///
/// ```
/// use luascope_extract::resolver::rewrite_require;
///
/// assert_eq!(
///     rewrite_require(r#"require("common/colors")"#),
///     Some("_api/common/colors.lua".to_string())
/// );
/// assert_eq!(rewrite_require("require(mod_name)"), None);
/// ```
pub fn rewrite_require(text: &str) -> Option<String> {
    let module = text.strip_prefix("require(\"")?.strip_suffix("\")")?;
    if module.starts_with("common/") {
        Some(format!("_api/{module}.lua"))
    } else {
        Some(format!("{module}.lua"))
    }
}

/// Keep only files reachable from the entry points through requires.
///
/// Starts from the entry-point set and follows `reference.call` captures
/// of the form `require("...")` transitively until the set stops growing.
/// Requires naming files outside the map still mark the path as used;
/// they simply select nothing.
pub fn filter_reachable(map: RepoMap, entry_points: &[String]) -> RepoMap {
    let mut used: BTreeSet<String> = entry_points.iter().cloned().collect();

    loop {
        let mut discovered = Vec::new();
        for path in &used {
            let Some(captures) = map.get(path) else {
                continue;
            };
            for capture in captures {
                if capture.label != "reference.call" || !capture.text.starts_with("require(") {
                    continue;
                }
                if let Some(target) = rewrite_require(&capture.text) {
                    if !used.contains(&target) {
                        discovered.push(target);
                    }
                }
            }
        }
        if discovered.is_empty() {
            break;
        }
        used.extend(discovered);
    }

    map.into_iter().filter(|(path, _)| used.contains(path)).collect()
}
