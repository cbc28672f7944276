//! Path helpers for builtins, leaf commands and predicates.
//!
//! Relative paths are resolved against the session's working directory
//! rather than the process one, and a leading `~` expands to the home
//! directory.

use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` / `~/` into the home directory. Anything else,
/// surrounding whitespace included, is taken as written.
pub fn normalize(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }

    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        return home.join(rest);
    }

    PathBuf::from(path)
}

/// Join path with the working directory, folding `.` and `..` lexically.
/// An empty path stays empty so it never names the working directory.
pub fn resolve(base: &Path, path: &str) -> PathBuf {
    if path.is_empty() {
        return PathBuf::new();
    }
    let normalized = normalize(path);

    if normalized.is_absolute() {
        return normalized;
    }

    let mut result = base.to_path_buf();
    for component in normalized.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(name) => {
                result.push(name);
            }
            _ => {}
        }
    }

    result
}

/// Final path component, `"."` for an empty path and `"/"` for the root.
pub fn basename(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".to_string() } else { "/".to_string() };
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}
