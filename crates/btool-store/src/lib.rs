//! Packfile-backed object store for the btool snapshot engine.
//!
//! The store deduplicates, buffers, commits, and reads back opaque objects
//! keyed by their content digest. On disk a repository is a `.btool/`
//! directory holding an `index.json` (digest → packfile location), a
//! `packs/` directory of packfiles (raw concatenated object bytes, each file
//! named by its own digest), a `snaps/` directory of snapshot manifests, and
//! a `meta/` directory for the snapshot counter.
//!
//! # Commit protocol
//!
//! Pending objects accumulate in memory until [`ObjectStore::commit`], which
//! concatenates them in digest order into a single new packfile, syncs it to
//! disk, and only then rewrites the index. A crash between the two leaves the
//! repository in its prior consistent state with an orphaned packfile that
//! the next prune reclaims.

pub mod error;
pub mod layout;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use layout::RepoLayout;
pub use store::ObjectStore;
