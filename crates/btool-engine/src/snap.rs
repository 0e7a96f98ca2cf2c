use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;

use chrono::{SecondsFormat, Utc};

use btool_chunker::{chunk_file, ChunkerConfig};
use btool_snaps::SnapCounter;
use btool_store::{ObjectStore, RepoLayout};
use btool_types::{ChunkRef, Digest, EntryKind, FileManifest, SnapManifest, Tree, TreeEntry};

use crate::error::{EngineError, EngineResult};
use crate::ignore::{always_excluded, IgnoreRules};
use crate::walk::collect_files;
use crate::worker_count;

/// Outcome of a successful snap.
#[derive(Clone, Debug)]
pub struct SnapReport {
    /// Sequential ID assigned to the snapshot.
    pub id: u64,
    /// Digest of the snapshot manifest file.
    pub snap_digest: Digest,
    /// Digest of the root tree.
    pub root_tree_hash: Digest,
    /// Total source bytes captured.
    pub source_size: u64,
    /// Pack bytes added by this snapshot's commit.
    pub snap_size: u64,
    /// Number of regular files captured.
    pub file_count: usize,
}

/// Create a new snapshot of `target` with an optional message.
///
/// Walks the tree, chunks and stores every regular file in parallel, builds
/// the tree objects bottom-up, commits the object store, then records the
/// snapshot manifest and bumps the ID counter. A counter-bump failure after
/// the manifest is durably written is a warning, not an error: the snapshot
/// itself is valid.
pub fn snap(target: &Path, rules: &dyn IgnoreRules, message: &str) -> EngineResult<SnapReport> {
    let root = target.canonicalize().map_err(|_| {
        EngineError::UserInput(format!("target directory does not exist: {}", target.display()))
    })?;
    if !root.is_dir() {
        return Err(EngineError::UserInput(format!(
            "target is not a directory: {}",
            root.display()
        )));
    }

    let layout = RepoLayout::new(&root);
    layout.ensure()?;
    let store = ObjectStore::new(&root);

    let files = collect_files(&root, rules)?;
    let (manifests, source_size) = process_files(&store, &files)?;
    let root_tree_hash = build_tree(&store, &root, &root, rules, &manifests)?;
    let snap_size = store.commit()?;

    let counter = SnapCounter::new(&root);
    let id = counter.peek()?;
    let manifest = SnapManifest {
        id,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        root_tree_hash,
        message: message.to_string(),
        source_size,
        snap_size,
    };
    let bytes = manifest.to_manifest_bytes()?;
    let snap_digest = Digest::of(&bytes);
    fs::write(
        layout.snaps_dir().join(format!("{}.json", snap_digest.to_hex())),
        &bytes,
    )?;

    if let Err(e) = counter.bump() {
        tracing::warn!(error = %e, "failed to bump snap counter; the next snap may reuse ID {id}");
    }

    Ok(SnapReport {
        id,
        snap_digest,
        root_tree_hash,
        source_size,
        snap_size,
        file_count: files.len(),
    })
}

/// Chunk and store every file with a pool of workers.
///
/// Returns `path -> file manifest digest` plus the accumulated source size.
/// The first worker error aborts the pipeline: the coordinator stops
/// consuming results, the channels disconnect, and the remaining workers
/// drain and exit.
fn process_files(
    store: &ObjectStore,
    files: &[PathBuf],
) -> EngineResult<(HashMap<PathBuf, Digest>, u64)> {
    if files.is_empty() {
        return Ok((HashMap::new(), 0));
    }

    let workers = worker_count();
    let (job_tx, job_rx) = crossbeam_channel::bounded::<PathBuf>(workers * 2);
    let (result_tx, result_rx) =
        crossbeam_channel::bounded::<(PathBuf, EngineResult<(Digest, u64)>)>(workers * 2);
    let config = ChunkerConfig::default();

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let config = &config;
            scope.spawn(move || {
                for path in job_rx {
                    let outcome = process_one(store, &path, config);
                    if result_tx.send((path, outcome)).is_err() {
                        return;
                    }
                }
            });
        }
        // The clones above keep the channels alive inside the workers; the
        // originals must go so disconnection propagates on early exit.
        drop(job_rx);
        drop(result_tx);

        scope.spawn(move || {
            for file in files {
                if job_tx.send(file.clone()).is_err() {
                    return;
                }
            }
        });

        let mut manifests = HashMap::with_capacity(files.len());
        let mut total_size = 0u64;
        for (path, outcome) in &result_rx {
            match outcome {
                Ok((digest, size)) => {
                    manifests.insert(path, digest);
                    total_size += size;
                }
                Err(source) => {
                    return Err(EngineError::File {
                        path,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok((manifests, total_size))
    })
}

/// Chunk one file, store its chunks, and store its manifest.
fn process_one(
    store: &ObjectStore,
    path: &Path,
    config: &ChunkerConfig,
) -> EngineResult<(Digest, u64)> {
    let (chunks, total_size) = chunk_file(path, config)?;

    let mut refs = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        store.write(&chunk.data)?;
        refs.push(ChunkRef {
            hash: chunk.hash,
            size: chunk.size,
        });
    }

    let manifest = FileManifest::new(refs);
    let digest = store.write(&manifest.to_canonical_bytes()?)?;
    Ok((digest, total_size))
}

/// Build the tree object for `dir` bottom-up, storing each tree and
/// returning its digest.
///
/// Runs single-threaded after all file manifests exist. Non-regular files
/// and non-UTF-8 names are skipped, mirroring the walk.
fn build_tree(
    store: &ObjectStore,
    root: &Path,
    dir: &Path,
    rules: &dyn IgnoreRules,
    manifests: &HashMap<PathBuf, Digest>,
) -> EngineResult<Digest> {
    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if always_excluded(root, &path) || rules.ignored(root, &path) {
            continue;
        }
        let Some(name) = dir_entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        let file_type = dir_entry.file_type()?;
        let mode = dir_entry.metadata()?.permissions().mode() & 0o777;

        if file_type.is_dir() {
            let subtree = build_tree(store, root, &path, rules, manifests)?;
            entries.push(TreeEntry::new(name, subtree, EntryKind::Tree, mode));
        } else if file_type.is_file() {
            let manifest_digest = manifests.get(&path).ok_or_else(|| {
                EngineError::Invariant(format!(
                    "missing manifest digest for file {}",
                    path.display()
                ))
            })?;
            entries.push(TreeEntry::new(name, *manifest_digest, EntryKind::Blob, mode));
        }
        // Symlinks and other non-regular entries are not captured.
    }

    let tree = Tree::new(entries);
    Ok(store.write(&tree.to_canonical_bytes()?)?)
}
