//! Parse-time options (spec §2, §9).
//!
//! Grounded in the teacher's top-level `Cargo.toml`/`serde` usage for
//! configuration structs elsewhere in the pack; `allow_includes` defaults
//! to `false` since blindly honouring a Gerber `IF` (include file)
//! statement lets a crafted file read arbitrary paths off disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Honor Gerber `%IF<name>*%` include statements (spec §4.5's
    /// "Open Questions" resolves this to opt-in, see DESIGN.md).
    #[serde(default)]
    pub allow_includes: bool,

    /// Directory include paths are resolved against. Defaults to the
    /// directory containing the file being parsed.
    #[serde(default)]
    pub include_root: Option<PathBuf>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_includes: false,
            include_root: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IncludeResolutionError {
    #[error("include statements are disabled for this parse (allow_includes = false)")]
    Disabled,

    #[error("include path \"{0}\" escapes the include root")]
    PathTraversal(String),

    #[error("failed to read include file \"{0}\": {1}")]
    Io(String, String),
}

/// Resolve and read an `IF` include's target, rejecting absolute paths and
/// `..` traversal components (spec §9: includes must not escape the
/// directory they were loaded from).
pub fn resolve_include(name: &str, root: &Path, options: &ParseOptions) -> Result<String, IncludeResolutionError> {
    if !options.allow_includes {
        return Err(IncludeResolutionError::Disabled);
    }

    let candidate = Path::new(name);
    if candidate.is_absolute() || candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(IncludeResolutionError::PathTraversal(name.to_string()));
    }

    let resolved = root.join(candidate);
    std::fs::read_to_string(&resolved).map_err(|err| IncludeResolutionError::Io(name.to_string(), err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_traversal() {
        let options = ParseOptions { allow_includes: true, include_root: None };
        let err = resolve_include("../secrets.txt", Path::new("/tmp"), &options).unwrap_err();
        assert!(matches!(err, IncludeResolutionError::PathTraversal(_)));
    }

    #[test]
    fn disabled_by_default() {
        let options = ParseOptions::default();
        let err = resolve_include("panel.gbr", Path::new("/tmp"), &options).unwrap_err();
        assert!(matches!(err, IncludeResolutionError::Disabled));
    }
}
