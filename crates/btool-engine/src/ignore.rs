use std::fs;
use std::path::Path;

use btool_store::layout::{BTOOL_DIR_NAME, IGNORE_FILE_NAME};

/// Predicate deciding whether a path is excluded from a snapshot.
///
/// The engines consume this as an opaque collaborator: when a directory is
/// ignored the walker does not descend into it. Implementations must be
/// callable from many worker threads. Regardless of the predicate, the
/// engines always exclude the repository directory (`.btool`) and the
/// ignore file itself.
pub trait IgnoreRules: Send + Sync {
    /// Returns `true` if `path` (absolute, under `root`) should be skipped.
    fn ignored(&self, root: &Path, path: &Path) -> bool;
}

/// Ignore nothing; every regular file is snapped.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIgnore;

impl IgnoreRules for NoIgnore {
    fn ignored(&self, _root: &Path, _path: &Path) -> bool {
        false
    }
}

/// Pattern-based ignore rules loaded from a `.btoolignore` file.
///
/// Supported pattern forms, one per line:
///
/// - Blank lines and lines starting with `#` are skipped.
/// - A pattern ending in `/` matches a directory (and its contents) by
///   relative path or by name.
/// - A pattern containing `/` matches against the path relative to the root.
/// - A bare name matches any path component, so `target` ignores every
///   `target` directory in the tree.
/// - `*` within a pattern matches any run of characters except `/`.
///
/// This is a deliberately small subset of gitignore syntax; negation and
/// `**` are not supported.
#[derive(Clone, Debug, Default)]
pub struct PatternIgnore {
    patterns: Vec<String>,
}

impl PatternIgnore {
    /// Build from explicit pattern lines.
    pub fn from_patterns<I: IntoIterator<Item = String>>(patterns: I) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        Self { patterns }
    }

    /// Load patterns from `<root>/.btoolignore`. A missing file yields an
    /// empty rule set.
    pub fn load(root: &Path) -> Self {
        match fs::read_to_string(root.join(IGNORE_FILE_NAME)) {
            Ok(content) => Self::from_patterns(content.lines().map(str::to_string)),
            Err(_) => Self::default(),
        }
    }

    fn pattern_matches(pattern: &str, rel: &str) -> bool {
        let dir_pattern = pattern.strip_suffix('/');
        let pattern = dir_pattern.unwrap_or(pattern);

        if pattern.contains('/') {
            // Anchored to the root: match the relative path itself or any
            // prefix of it (a matched directory swallows its contents).
            glob_eq(pattern, rel)
                || rel
                    .match_indices('/')
                    .any(|(i, _)| glob_eq(pattern, &rel[..i]))
        } else {
            rel.split('/').any(|component| glob_eq(pattern, component))
        }
    }
}

/// Match `pattern` against `text`, with `*` standing for any run of
/// characters except `/`.
fn glob_eq(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => {
                for stop in 0..=t.len() {
                    if t[..stop].contains(&b'/') {
                        break;
                    }
                    if inner(&p[1..], &t[stop..]) {
                        return true;
                    }
                }
                false
            }
            Some(&c) => t.first() == Some(&c) && inner(&p[1..], &t[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

impl IgnoreRules for PatternIgnore {
    fn ignored(&self, root: &Path, path: &Path) -> bool {
        let rel = match path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => return false,
        };
        let Some(rel) = rel.to_str() else {
            return false;
        };
        self.patterns
            .iter()
            .any(|pattern| Self::pattern_matches(pattern, rel))
    }
}

/// Returns `true` for paths the engines unconditionally exclude: the
/// repository directory and the ignore file, at the repository root.
pub(crate) fn always_excluded(root: &Path, path: &Path) -> bool {
    path == root.join(BTOOL_DIR_NAME) || path == root.join(IGNORE_FILE_NAME)
}
