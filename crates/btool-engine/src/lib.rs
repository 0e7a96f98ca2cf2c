//! Snapshot, restore, and prune engines for btool.
//!
//! This crate drives the repository end to end:
//!
//! - [`snap`] walks a directory tree, chunks every regular file in parallel,
//!   writes chunks, file manifests, and trees to the object store, commits a
//!   packfile, and records a snapshot manifest.
//! - [`restore`] reconstructs a snapshot into a target directory, rebuilding
//!   files in parallel from their manifests.
//! - [`prune`] drops snapshots older than a cut point, marks everything
//!   reachable from the survivors, repacks the live data, and atomically
//!   swaps the repository state.
//!
//! Each engine invocation exclusively owns its repository for the duration
//! of the call; there is no cross-process locking.

pub mod error;
pub mod ignore;
pub mod prune;
pub mod restore;
pub mod snap;
pub mod walk;

pub use error::{EngineError, EngineResult};
pub use ignore::{IgnoreRules, NoIgnore, PatternIgnore};
pub use prune::{prune, PruneReport};
pub use restore::restore;
pub use snap::{snap, SnapReport};
pub use walk::collect_files;

/// Number of parallel workers: hardware parallelism with a floor of 1.
pub(crate) fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
}
