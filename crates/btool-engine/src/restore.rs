use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

use btool_snaps::SnapCatalog;
use btool_store::layout::{BTOOL_DIR_NAME, IGNORE_FILE_NAME};
use btool_store::ObjectStore;
use btool_types::{Digest, EntryKind, FileManifest, Tree};

use crate::error::{EngineError, EngineResult};
use crate::worker_count;

/// One file to reconstruct: manifest digest, destination, and mode bits.
struct RestoreJob {
    manifest: Digest,
    destination: PathBuf,
    mode: u32,
}

/// Reconstruct the snapshot named by `identifier` into `output`.
///
/// The output directory is replaced so it becomes an exact replica of the
/// snapshot; callers wanting non-destructive behaviour must restore
/// elsewhere. Restoring in place (output equal to the repository root)
/// preserves the `.btool` directory and the ignore file and clears
/// everything else.
///
/// Tree traversal runs on the calling thread; file reconstruction runs on a
/// pool of workers, each holding at most one whole file in memory. The
/// first error aborts the operation; partial restore state is left on disk.
pub fn restore(repo: &Path, identifier: &str, output: &Path) -> EngineResult<()> {
    let root = repo.canonicalize().map_err(|_| {
        EngineError::UserInput(format!("repository directory does not exist: {}", repo.display()))
    })?;

    let catalog = SnapCatalog::new(&root);
    let snap = catalog.resolve(identifier)?;

    prepare_output(&root, output)?;
    let store = ObjectStore::new(&root);

    let workers = worker_count();
    let (job_tx, job_rx) = crossbeam_channel::bounded::<RestoreJob>(workers * 2);
    let first_error: Mutex<Option<EngineError>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let first_error = &first_error;
            let store = &store;
            scope.spawn(move || {
                for job in job_rx {
                    if let Err(e) = restore_file(store, &job) {
                        let mut slot = first_error.lock().expect("lock poisoned");
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                }
            });
        }
        drop(job_rx);

        let traversal = restore_tree(
            &store,
            &snap.root_tree_hash,
            output,
            &job_tx,
            &first_error,
        );
        drop(job_tx);
        traversal
    })?;

    match first_error.into_inner().expect("lock poisoned") {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Validate and clear the output path.
///
/// An existing non-directory fails with a user-input error before any data
/// is touched. An in-place restore keeps the repository directory itself.
fn prepare_output(root: &Path, output: &Path) -> EngineResult<()> {
    if output.exists() && !output.is_dir() {
        return Err(EngineError::UserInput(format!(
            "output path exists and is not a directory: {}",
            output.display()
        )));
    }

    let in_place = output
        .canonicalize()
        .map(|out| out == root)
        .unwrap_or(false);
    if in_place {
        for entry in fs::read_dir(output)? {
            let entry = entry?;
            if entry.file_name() == BTOOL_DIR_NAME || entry.file_name() == IGNORE_FILE_NAME {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    } else {
        if output.exists() {
            fs::remove_dir_all(output)?;
        }
        fs::create_dir_all(output)?;
    }
    Ok(())
}

/// Recursively recreate directories and enqueue file jobs.
///
/// Directories are created before recursion; their mode is applied after so
/// a read-only directory does not block the files being written inside it.
fn restore_tree(
    store: &ObjectStore,
    tree_hash: &Digest,
    destination: &Path,
    jobs: &crossbeam_channel::Sender<RestoreJob>,
    first_error: &Mutex<Option<EngineError>>,
) -> EngineResult<()> {
    let tree: Tree = store.read_as(tree_hash)?;
    fs::create_dir_all(destination)?;

    for entry in &tree.entries {
        // Stop traversal early once a worker has failed.
        if first_error.lock().expect("lock poisoned").is_some() {
            return Ok(());
        }
        let target = destination.join(&entry.name);
        match entry.kind {
            EntryKind::Blob => {
                if jobs
                    .send(RestoreJob {
                        manifest: entry.hash,
                        destination: target,
                        mode: entry.mode,
                    })
                    .is_err()
                {
                    return Ok(());
                }
            }
            EntryKind::Tree => {
                restore_tree(store, &entry.hash, &target, jobs, first_error)?;
                let perms = fs::Permissions::from_mode(entry.mode);
                if let Err(e) = fs::set_permissions(&target, perms) {
                    tracing::warn!(
                        path = %target.display(),
                        error = %e,
                        "could not set directory mode"
                    );
                }
            }
        }
    }
    Ok(())
}

/// Rebuild one file from its manifest: read every chunk in order, write the
/// concatenation, apply the stored mode bits.
fn restore_file(store: &ObjectStore, job: &RestoreJob) -> EngineResult<()> {
    let manifest: FileManifest = store.read_as(&job.manifest)?;

    let mut content = Vec::with_capacity(manifest.total_size as usize);
    for chunk_ref in &manifest.chunks {
        let chunk = store.read(&chunk_ref.hash)?;
        content.extend_from_slice(&chunk);
    }

    fs::write(&job.destination, &content)?;
    fs::set_permissions(&job.destination, fs::Permissions::from_mode(job.mode))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::NoIgnore;
    use crate::snap::snap;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn output_path_that_is_a_file_fails_before_touching_data() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "data.txt", b"content");
        snap(tmp.path(), &NoIgnore, "").unwrap();

        let out_parent = tempfile::tempdir().unwrap();
        let out_file = out_parent.path().join("not_a_dir");
        fs::write(&out_file, b"occupied").unwrap();

        let err = restore(tmp.path(), "1", &out_file).unwrap_err();
        assert!(matches!(err, EngineError::UserInput(_)));
        // The offending file is untouched.
        assert_eq!(fs::read(&out_file).unwrap(), b"occupied");
    }

    #[test]
    fn unknown_identifier_reports_no_snap_found() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "data.txt", b"content");
        snap(tmp.path(), &NoIgnore, "").unwrap();

        let out = tempfile::tempdir().unwrap();
        let err = restore(tmp.path(), "999", out.path()).unwrap_err();
        assert!(err.to_string().contains("no snap found"));
    }

    #[test]
    fn restore_replaces_existing_output_contents() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "wanted.txt", b"wanted");
        snap(tmp.path(), &NoIgnore, "").unwrap();

        let out = tempfile::tempdir().unwrap();
        write(out.path(), "leftover.txt", b"stale");
        restore(tmp.path(), "1", out.path()).unwrap();

        assert!(out.path().join("wanted.txt").is_file());
        assert!(!out.path().join("leftover.txt").exists());
    }

    #[test]
    fn in_place_restore_preserves_repository() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "keep.txt", b"original");
        snap(tmp.path(), &NoIgnore, "").unwrap();

        write(tmp.path(), "keep.txt", b"modified after snap");
        write(tmp.path(), "junk.txt", b"junk");
        restore(tmp.path(), "1", tmp.path()).unwrap();

        assert_eq!(fs::read(tmp.path().join("keep.txt")).unwrap(), b"original");
        assert!(!tmp.path().join("junk.txt").exists());
        assert!(tmp.path().join(".btool").is_dir());
    }

    #[test]
    fn modes_are_restored() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "script.sh", b"#!/bin/sh\n");
        fs::set_permissions(
            tmp.path().join("script.sh"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();
        write(tmp.path(), "private/secret.txt", b"s");
        fs::set_permissions(
            tmp.path().join("private"),
            fs::Permissions::from_mode(0o700),
        )
        .unwrap();
        snap(tmp.path(), &NoIgnore, "").unwrap();

        let out = tempfile::tempdir().unwrap();
        restore(tmp.path(), "1", out.path()).unwrap();

        let script_mode = fs::metadata(out.path().join("script.sh"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(script_mode, 0o755);
        let dir_mode = fs::metadata(out.path().join("private"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn empty_files_restore_empty() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "empty.txt", b"");
        snap(tmp.path(), &NoIgnore, "").unwrap();

        let out = tempfile::tempdir().unwrap();
        restore(tmp.path(), "1", out.path()).unwrap();
        assert_eq!(fs::read(out.path().join("empty.txt")).unwrap(), b"");
    }
}
