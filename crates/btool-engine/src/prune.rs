use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::thread;

use dashmap::DashSet;

use btool_snaps::SnapCatalog;
use btool_store::{ObjectStore, RepoLayout};
use btool_types::{Digest, FileManifest, PackIndex, Tree};

use crate::error::{EngineError, EngineResult};

/// Outcome of a successful prune.
#[derive(Clone, Debug)]
pub struct PruneReport {
    /// Snapshots deleted.
    pub pruned: usize,
    /// Snapshots kept.
    pub kept: usize,
    /// Objects in the rewritten index.
    pub live_objects: usize,
}

/// Delete every snapshot older than the one named by `identifier`, then
/// repack the repository around the surviving objects.
///
/// Marking runs one thread per kept snapshot over a shared live-set. The
/// sweep keeps whole packfiles referenced by any live object, preserving
/// every live object's indexed location; packfiles referenced by nothing
/// live are left behind and removed with the old packs directory. The swap
/// from old state to new is a rename sequence whose every intermediate
/// state is recoverable:
///
/// ```text
/// stable -> backed_up (packs/index renamed to .bak)
///        -> new_active (tmp packs/index renamed into place)
///        -> stable (backups removed)
/// ```
///
/// If backups remain after a crash, the next prune removes them: their
/// presence alongside the live names means the live names are
/// authoritative; alone, they were never replaced and the repository is
/// unchanged.
pub fn prune(repo: &Path, identifier: &str) -> EngineResult<PruneReport> {
    let root = repo.canonicalize().map_err(|_| {
        EngineError::UserInput(format!("repository directory does not exist: {}", repo.display()))
    })?;

    let catalog = SnapCatalog::new(&root);
    let snaps = catalog.list()?;
    let keep_from = catalog.resolve(identifier)?;
    let cut = snaps
        .iter()
        .position(|s| s.digest == keep_from.digest)
        .ok_or_else(|| {
            EngineError::Invariant("resolved snapshot missing from sorted catalog".into())
        })?;
    let (to_prune, to_keep) = snaps.split_at(cut);

    if to_prune.is_empty() {
        return Ok(PruneReport {
            pruned: 0,
            kept: to_keep.len(),
            live_objects: 0,
        });
    }

    // Recover from any previously interrupted prune before reading the
    // index: a mid-swap crash leaves the authoritative state under backup
    // names.
    let layout = RepoLayout::new(&root);
    let tmp_packs = layout.btool_dir().join("packs.tmp");
    let tmp_index = layout.btool_dir().join("index.json.tmp");
    clear_stale(&tmp_packs, &tmp_index, &layout)?;

    let store = ObjectStore::new(&root);
    let live = mark_live(&store, to_keep)?;

    let old_index = store.index_snapshot()?;
    let (new_index, referenced_packs) = sweep(&old_index, &live);

    fs::create_dir_all(&tmp_packs)?;
    for pack in &referenced_packs {
        copy_synced(
            &layout.packs_dir().join(pack.to_hex()),
            &tmp_packs.join(pack.to_hex()),
        )?;
    }

    let index_bytes = new_index
        .to_json_bytes()
        .map_err(|e| EngineError::Invariant(format!("index serialization failed: {e}")))?;
    let mut index_file = File::create(&tmp_index)?;
    index_file.write_all(&index_bytes)?;
    index_file.sync_all()?;

    swap_into_place(&layout, &tmp_packs, &tmp_index)?;

    // Drop the pruned snapshot manifests last; at this point the new state
    // is authoritative and a failed delete only leaves a stale manifest.
    let snaps_dir = layout.snaps_dir();
    for snap in to_prune {
        let path = snaps_dir.join(format!("{}.json", snap.digest.to_hex()));
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not delete pruned snap manifest");
        }
    }

    Ok(PruneReport {
        pruned: to_prune.len(),
        kept: to_keep.len(),
        live_objects: new_index.len(),
    })
}

/// Mark every object reachable from the kept snapshots' root trees.
fn mark_live(
    store: &ObjectStore,
    kept: &[btool_snaps::SnapDetail],
) -> EngineResult<DashSet<Digest>> {
    let live = DashSet::new();
    let first_error: Mutex<Option<EngineError>> = Mutex::new(None);

    thread::scope(|scope| {
        for snap in kept {
            let live = &live;
            let first_error = &first_error;
            scope.spawn(move || {
                if let Err(e) = mark_reachable(store, snap.root_tree_hash, live) {
                    let mut slot = first_error.lock().expect("lock poisoned");
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                }
            });
        }
    });

    match first_error.into_inner().expect("lock poisoned") {
        Some(e) => Err(e),
        None => Ok(live),
    }
}

/// Recursively mark `digest` and everything it references.
///
/// The store is untyped, so the object's bytes are probed: a parse as a
/// tree with entries wins, then a parse as a file manifest with chunks;
/// anything else is a leaf chunk. An empty tree or empty manifest probes as
/// a chunk, which is safe because neither has outgoing references.
fn mark_reachable(
    store: &ObjectStore,
    digest: Digest,
    live: &DashSet<Digest>,
) -> EngineResult<()> {
    if !live.insert(digest) {
        return Ok(());
    }
    let bytes = store.read(&digest)?;

    if let Ok(tree) = Tree::from_bytes(&bytes) {
        if !tree.entries.is_empty() {
            for entry in &tree.entries {
                mark_reachable(store, entry.hash, live)?;
            }
            return Ok(());
        }
    }

    if let Ok(manifest) = FileManifest::from_bytes(&bytes) {
        if !manifest.chunks.is_empty() {
            for chunk_ref in &manifest.chunks {
                // Chunks are leaves; no recursion needed.
                live.insert(chunk_ref.hash);
            }
            return Ok(());
        }
    }

    Ok(())
}

/// Build the filtered index and the set of packfiles it references.
///
/// Live digests keep their old locations. A live digest absent from the old
/// index indicates pre-existing corruption; it is logged and skipped rather
/// than failing the prune.
fn sweep(old_index: &PackIndex, live: &DashSet<Digest>) -> (PackIndex, BTreeSet<Digest>) {
    let mut new_index = PackIndex::new();
    let mut referenced = BTreeSet::new();
    for digest in live.iter() {
        match old_index.get(&*digest) {
            Some(entry) => {
                referenced.insert(entry.pack_hash);
                new_index.insert(*digest, *entry);
            }
            None => {
                tracing::warn!(digest = %*digest, "live object missing from index");
            }
        }
    }
    (new_index, referenced)
}

/// Remove leftovers of a previously interrupted prune.
///
/// Backups alongside live names mean the previous prune activated its new
/// state before dying, so the backups are garbage. Backups without live
/// names would mean the rename sequence died mid-swap; the backups are then
/// restored rather than removed.
fn clear_stale(tmp_packs: &Path, tmp_index: &Path, layout: &RepoLayout) -> EngineResult<()> {
    if tmp_packs.exists() {
        fs::remove_dir_all(tmp_packs)?;
    }
    if tmp_index.exists() {
        fs::remove_file(tmp_index)?;
    }

    let bak_packs = layout.btool_dir().join("packs.bak");
    let bak_index = layout.btool_dir().join("index.json.bak");
    if bak_packs.exists() {
        if layout.packs_dir().exists() {
            fs::remove_dir_all(&bak_packs)?;
        } else {
            fs::rename(&bak_packs, layout.packs_dir())?;
        }
    }
    if bak_index.exists() {
        if layout.index_path().exists() {
            fs::remove_file(&bak_index)?;
        } else {
            fs::rename(&bak_index, layout.index_path())?;
        }
    }
    Ok(())
}

/// The atomic swap: back up the old state, activate the new, drop backups.
fn swap_into_place(layout: &RepoLayout, tmp_packs: &Path, tmp_index: &Path) -> EngineResult<()> {
    let packs_dir = layout.packs_dir();
    let index_path = layout.index_path();
    let bak_packs = layout.btool_dir().join("packs.bak");
    let bak_index = layout.btool_dir().join("index.json.bak");

    rename_tolerant(&packs_dir, &bak_packs)?;
    rename_tolerant(&index_path, &bak_index)?;

    fs::rename(tmp_packs, &packs_dir)?;
    fs::rename(tmp_index, &index_path)?;

    if bak_packs.exists() {
        let _ = fs::remove_dir_all(&bak_packs);
    }
    let _ = fs::remove_file(&bak_index);
    Ok(())
}

/// Rename that tolerates a missing source (fresh repositories have no packs
/// or index yet).
fn rename_tolerant(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy a packfile and sync the destination to stable storage.
fn copy_synced(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;
    File::open(to)?.sync_all()
}
