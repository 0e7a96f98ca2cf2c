//! Snapshot catalog and ID counter for the btool snapshot engine.
//!
//! The catalog enumerates the snapshot-manifest files in a repository's
//! `snaps/` directory and resolves user-supplied identifiers (sequential ID
//! or digest prefix) to a single snapshot. It is deliberately tolerant of
//! partial corruption: an unreadable or malformed manifest is skipped so a
//! damaged snapshot cannot break listing or restore of the others.
//!
//! The counter is a single durable integer in `meta/counter` that hands out
//! monotonically increasing snapshot IDs, surviving prunes so IDs are never
//! reused.

pub mod catalog;
pub mod counter;
pub mod error;

pub use catalog::{SnapCatalog, SnapDetail};
pub use counter::SnapCounter;
pub use error::{SnapsError, SnapsResult};
