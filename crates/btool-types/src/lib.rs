//! Core data model for the btool snapshot engine.
//!
//! Every piece of data btool stores (file chunks, file manifests, directory
//! trees, snapshot manifests) is an immutable object identified by the
//! BLAKE3 hash of its bytes. This crate defines the digest type, the
//! structured object types with their canonical JSON encodings, and the pack
//! index that locates objects inside packfiles.
//!
//! # Canonical encoding
//!
//! Structured objects are serialised with `serde_json` using fixed field
//! names and deterministic ordering (tree entries sorted by name, index keys
//! in a `BTreeMap`), so identical semantic content always yields identical
//! bytes and therefore identical digests.

pub mod digest;
pub mod error;
pub mod index;
pub mod objects;

pub use digest::Digest;
pub use error::{TypeError, TypeResult};
pub use index::{PackIndex, PackIndexEntry};
pub use objects::{ChunkRef, EntryKind, FileManifest, SnapManifest, Tree, TreeEntry};
