//! LuaLS annotation expansion for API stub files.
//!
//! Files under `_api/common/` describe their surface with `---@class` /
//! `---@field` annotations on otherwise empty tables. The parser sees no
//! definitions there, so before parsing we append synthetic Lua
//! declarations derived from the annotations: method stubs for `fun`
//! fields, assignment stubs for plain fields. The stubs only need to
//! satisfy the structural queries; they are never executed.

/// Expand `---@class` / `---@field` annotations into parseable stubs.
///
/// The input is returned with the generated declarations appended. Lines
/// that are not annotations pass through untouched, and a `---@field`
/// seen before any `---@class` produces a stub with an empty class name,
/// matching the annotated files this was written for (they always open
/// with the class line).
///
/// # Examples
///
/// ```
/// use luascope_extract::annotations::expand_api_annotations;
///
/// let source = "---@class color\n---@field new fun(r, g, b)\n";
/// let expanded = expand_api_annotations(source);
/// assert!(expanded.contains("function color:new(r, g, b) end"));
/// ```
pub fn expand_api_annotations(content: &str) -> String {
    let mut current_class = String::new();
    let mut stubs = Vec::new();

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("---@class") {
            if let Some(name) = rest.split_whitespace().next() {
                current_class = name.to_string();
            }
        } else if let Some(rest) = line.strip_prefix("---@field") {
            let field = rest.replace("public", "");
            let field = field.trim();
            if field.contains("fun") {
                stubs.push(format!(
                    "function {current_class}:{} end",
                    field.replace(" fun", "")
                ));
            } else {
                let mut parts = field.split_whitespace();
                let name = parts.next().unwrap_or("");
                let ty = parts.next().unwrap_or("");
                stubs.push(format!("local {current_class}.{name} = \"{ty}\""));
            }
        }
    }

    if stubs.is_empty() {
        return content.to_string();
    }

    let mut expanded = content.to_string();
    if !expanded.ends_with('\n') {
        expanded.push('\n');
    }
    expanded.push_str(&stubs.join("\n"));
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fun_field_becomes_method_stub() {
        let source = "---@class vec3\n---@field length fun(self): number\n";
        let expanded = expand_api_annotations(source);
        assert!(expanded.contains("function vec3:length(self): number end"));
    }

    #[test]
    fn plain_field_becomes_assignment_stub() {
        let source = "---@class unit\n---@field name string\n";
        let expanded = expand_api_annotations(source);
        assert!(expanded.contains("local unit.name = \"string\""));
    }

    #[test]
    fn public_modifier_is_stripped() {
        let source = "---@class menu\n---@field public visible boolean\n";
        let expanded = expand_api_annotations(source);
        assert!(expanded.contains("local menu.visible = \"boolean\""));
    }

    #[test]
    fn class_changes_apply_to_following_fields() {
        let source = concat!(
            "---@class a\n",
            "---@field x number\n",
            "---@class b\n",
            "---@field y number\n",
        );
        let expanded = expand_api_annotations(source);
        assert!(expanded.contains("local a.x = \"number\""));
        assert!(expanded.contains("local b.y = \"number\""));
    }

    #[test]
    fn original_content_is_preserved_before_stubs() {
        let source = "---@class t\n---@field f fun()\nreturn t\n";
        let expanded = expand_api_annotations(source);
        assert!(expanded.starts_with(source));
    }

    #[test]
    fn no_annotations_means_no_change() {
        let source = "function plain() end\n";
        assert_eq!(expand_api_annotations(source), source);
    }
}
