use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{TypeError, TypeResult};

/// Reference to one chunk inside a file manifest: digest plus byte length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Digest of the chunk's bytes.
    pub hash: Digest,
    /// Length of the chunk in bytes.
    pub size: u64,
}

/// Structured object listing the ordered chunks that make up one file.
///
/// The invariant `total_size == sum(chunks[i].size)` holds for every
/// manifest produced by the snap engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    /// Chunk references in file order.
    pub chunks: Vec<ChunkRef>,
    /// Total file length in bytes.
    #[serde(rename = "totalSize")]
    pub total_size: u64,
}

impl FileManifest {
    /// Build a manifest from ordered chunk references.
    pub fn new(chunks: Vec<ChunkRef>) -> Self {
        let total_size = chunks.iter().map(|c| c.size).sum();
        Self { chunks, total_size }
    }

    /// Canonical JSON bytes of this manifest.
    pub fn to_canonical_bytes(&self) -> TypeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode from canonical JSON bytes.
    pub fn from_bytes(data: &[u8]) -> TypeResult<Self> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// What a tree entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// References a file manifest.
    #[serde(rename = "blob")]
    Blob,
    /// References another tree.
    #[serde(rename = "tree")]
    Tree,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// A single named entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// File or directory name (one path component).
    pub name: String,
    /// Digest of the referenced manifest or subtree.
    pub hash: Digest,
    /// Whether the entry is a file manifest or a subtree.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Low 9 bits of the POSIX mode.
    pub mode: u32,
}

impl TreeEntry {
    /// Create a new entry; `mode` is masked to its low 9 bits.
    pub fn new(name: impl Into<String>, hash: Digest, kind: EntryKind, mode: u32) -> Self {
        Self {
            name: name.into(),
            hash,
            kind,
            mode: mode & 0o777,
        }
    }
}

/// Directory listing object.
///
/// Entries are kept sorted by name so the canonical encoding, and therefore
/// the tree's digest, is a pure function of its contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Entries sorted by name ascending.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree, sorting the entries by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    /// Create an empty tree.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical JSON bytes of this tree.
    pub fn to_canonical_bytes(&self) -> TypeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode from canonical JSON bytes.
    pub fn from_bytes(data: &[u8]) -> TypeResult<Self> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// Snapshot manifest anchoring one point-in-time backup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapManifest {
    /// Sequential snapshot ID from the repository counter.
    pub id: u64,
    /// RFC-3339 UTC timestamp string.
    pub timestamp: String,
    /// Digest of the root tree.
    #[serde(rename = "rootTreeHash")]
    pub root_tree_hash: Digest,
    /// Optional user message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Total bytes of source content captured by this snapshot.
    #[serde(rename = "sourceSize")]
    pub source_size: u64,
    /// Bytes added to the pack directory when this snapshot committed.
    #[serde(rename = "snapSize")]
    pub snap_size: u64,
}

impl SnapManifest {
    /// Serialise to the pretty-printed JSON written to the snaps directory.
    ///
    /// The manifest's digest is computed over exactly these bytes.
    pub fn to_manifest_bytes(&self) -> TypeResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode from manifest bytes.
    pub fn from_bytes(data: &[u8]) -> TypeResult<Self> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
