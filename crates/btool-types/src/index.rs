use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{TypeError, TypeResult};

/// Location of one object inside a packfile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackIndexEntry {
    /// Digest naming the packfile that holds the object.
    #[serde(rename = "packHash")]
    pub pack_hash: Digest,
    /// Byte offset of the object within the packfile.
    pub offset: u64,
    /// Byte length of the object.
    pub length: u64,
}

/// Repository-wide map from object digest to packfile location.
///
/// Exactly one index exists per repository, persisted as `index.json`. A
/// `BTreeMap` keeps the serialised key order deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackIndex {
    entries: BTreeMap<Digest, PackIndexEntry>,
}

impl PackIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an object's location.
    pub fn get(&self, digest: &Digest) -> Option<&PackIndexEntry> {
        self.entries.get(digest)
    }

    /// Returns `true` if the digest is indexed.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.contains_key(digest)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, digest: Digest, entry: PackIndexEntry) {
        self.entries.insert(digest, entry);
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no objects are indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(digest, entry)` pairs in digest order.
    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &PackIndexEntry)> {
        self.entries.iter()
    }

    /// Serialise to the pretty-printed JSON stored as `index.json`.
    pub fn to_json_bytes(&self) -> TypeResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode from `index.json` bytes.
    pub fn from_json_bytes(data: &[u8]) -> TypeResult<Self> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
