use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::EngineResult;
use crate::ignore::{always_excluded, IgnoreRules};

/// Walk `root` depth-first and collect the absolute path of every regular
/// file to include in a snapshot.
///
/// Ignored directories are not descended into. Non-regular files (symlinks,
/// sockets, FIFOs, devices) and files with non-UTF-8 names are skipped:
/// snapshots hold only regular files and directories, and tree entries need
/// string names.
pub fn collect_files(root: &Path, rules: &dyn IgnoreRules) -> EngineResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.path() == root
                || (!always_excluded(root, entry.path())
                    && !rules.ignored(root, entry.path()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => crate::EngineError::Io(io),
            None => crate::EngineError::Invariant("walk produced a non-I/O error".into()),
        })?;
        if entry.path() == root {
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_str().is_none() {
            tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
            continue;
        }
        files.push(entry.path().to_path_buf());
    }
    Ok(files)
}
