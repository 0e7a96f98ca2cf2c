use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use btool_types::{Digest, PackIndex, PackIndexEntry};

use crate::error::{StoreError, StoreResult};
use crate::layout::RepoLayout;

/// In-memory store state, guarded by one mutex.
struct StoreState {
    /// Index of committed objects, lazily loaded from `index.json`.
    index: PackIndex,
    /// Objects written but not yet committed to a packfile.
    pending: HashMap<Digest, Vec<u8>>,
    /// Whether `index` reflects the on-disk file yet.
    loaded: bool,
}

/// Upper bound on cached packfile handles. Repositories rarely accumulate
/// more packs than this between prunes.
const PACK_HANDLE_LIMIT: usize = 16;

/// Content-addressed object store backed by packfiles.
///
/// One store instance owns a repository's object state for the duration of
/// an engine invocation. `write` deduplicates against both the index and the
/// pending set; `commit` persists everything pending as a single new
/// packfile. All public methods are safe to call from many worker threads;
/// the state mutex is held only across in-memory operations, never across
/// pack file reads.
///
/// Reads use positional I/O on shared handles, so parallel readers of the
/// same packfile never disturb each other's file cursor.
pub struct ObjectStore {
    layout: RepoLayout,
    state: Mutex<StoreState>,
    /// Opened packfile handles, keyed by pack digest.
    handles: Mutex<HashMap<Digest, Arc<File>>>,
}

impl ObjectStore {
    /// Create a store for the repository rooted at `root`.
    ///
    /// The index is not read until the first operation that needs it.
    pub fn new(root: &Path) -> Self {
        Self {
            layout: RepoLayout::new(root),
            state: Mutex::new(StoreState {
                index: PackIndex::new(),
                pending: HashMap::new(),
                loaded: false,
            }),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The repository layout this store operates on.
    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    /// Load `index.json` into `state.index` if not done yet. Callers must
    /// hold the state lock.
    fn load_index_locked(&self, state: &mut StoreState) -> StoreResult<()> {
        if state.loaded {
            return Ok(());
        }
        let path = self.layout.index_path();
        state.index = match fs::read(&path) {
            Ok(bytes) => PackIndex::from_json_bytes(&bytes)
                .map_err(|e| StoreError::CorruptIndex(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PackIndex::new(),
            Err(e) => return Err(e.into()),
        };
        state.loaded = true;
        Ok(())
    }

    /// Add an object to the pending set, returning its digest.
    ///
    /// If the digest is already indexed or already pending the call returns
    /// immediately without storing anything (deduplication). Thread-safe
    /// under arbitrary concurrent callers.
    pub fn write(&self, data: &[u8]) -> StoreResult<Digest> {
        let digest = Digest::of(data);
        let mut state = self.state.lock().expect("lock poisoned");
        self.load_index_locked(&mut state)?;

        if state.index.contains(&digest) || state.pending.contains_key(&digest) {
            return Ok(digest);
        }
        state.pending.insert(digest, data.to_vec());
        Ok(digest)
    }

    /// Read an object's bytes by digest.
    ///
    /// Pending bytes are served from memory; committed objects are read with
    /// a positional read from their packfile, outside the mutex, so parallel
    /// readers never serialise on I/O.
    pub fn read(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        let entry = {
            let mut state = self.state.lock().expect("lock poisoned");
            if let Some(data) = state.pending.get(digest) {
                return Ok(data.clone());
            }
            self.load_index_locked(&mut state)?;
            match state.index.get(digest) {
                Some(entry) => *entry,
                None => return Err(StoreError::NotFound(*digest)),
            }
        };
        self.read_from_pack(digest, &entry)
    }

    /// Read an object and parse it as a structured JSON object of kind `T`.
    pub fn read_as<T: DeserializeOwned>(&self, digest: &Digest) -> StoreResult<T> {
        let bytes = self.read(digest)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptObject {
            digest: *digest,
            reason: e.to_string(),
        })
    }

    /// Fetch or open a shared handle to the named packfile.
    ///
    /// The cache is bounded; when full it is dropped wholesale, which only
    /// costs reopening on the next read. Handles stay valid even if prune
    /// later renames the packs directory, because the descriptor survives
    /// the rename.
    fn pack_handle(&self, pack_hash: &Digest) -> StoreResult<Arc<File>> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        if let Some(file) = handles.get(pack_hash) {
            return Ok(Arc::clone(file));
        }
        let path = self.layout.packs_dir().join(pack_hash.to_hex());
        let file = Arc::new(File::open(&path)?);
        if handles.len() >= PACK_HANDLE_LIMIT {
            handles.clear();
        }
        handles.insert(*pack_hash, Arc::clone(&file));
        Ok(file)
    }

    fn read_from_pack(&self, digest: &Digest, entry: &PackIndexEntry) -> StoreResult<Vec<u8>> {
        let file = self.pack_handle(&entry.pack_hash)?;
        let mut buffer = vec![0u8; entry.length as usize];
        file.read_exact_at(&mut buffer, entry.offset).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StoreError::CorruptObject {
                    digest: *digest,
                    reason: format!(
                        "packfile {} shorter than indexed range {}+{}",
                        entry.pack_hash.short_hex(),
                        entry.offset,
                        entry.length
                    ),
                }
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(buffer)
    }

    /// Persist every pending object into one new packfile and rewrite the
    /// index. Returns the byte length of the new packfile, or 0 if nothing
    /// was pending (in which case no disk writes happen).
    ///
    /// Pending objects are concatenated in ascending digest order, so the
    /// pack digest is a pure function of the pending content. The packfile
    /// is fully written and synced before the index is rewritten; a crash
    /// between the two leaves the previous index authoritative and only an
    /// orphaned packfile behind.
    pub fn commit(&self) -> StoreResult<u64> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.pending.is_empty() {
            return Ok(0);
        }
        self.load_index_locked(&mut state)?;

        let mut digests: Vec<Digest> = state.pending.keys().copied().collect();
        digests.sort();

        let mut pack_buffer = Vec::new();
        let mut placements = Vec::with_capacity(digests.len());
        for digest in &digests {
            let data = &state.pending[digest];
            placements.push((*digest, pack_buffer.len() as u64, data.len() as u64));
            pack_buffer.extend_from_slice(data);
        }

        let pack_hash = Digest::of(&pack_buffer);
        let packs_dir = self.layout.packs_dir();
        fs::create_dir_all(&packs_dir)?;
        let pack_path = packs_dir.join(pack_hash.to_hex());
        let mut pack_file = File::create(&pack_path)?;
        pack_file.write_all(&pack_buffer)?;
        // Durability barrier: the packfile must be on stable storage before
        // the index can name it.
        pack_file.sync_all()?;

        for (digest, offset, length) in placements {
            state.index.insert(
                digest,
                PackIndexEntry {
                    pack_hash,
                    offset,
                    length,
                },
            );
        }
        self.write_index_locked(&state.index)?;
        state.pending.clear();
        Ok(pack_buffer.len() as u64)
    }

    /// Rewrite `index.json` via a temp file and rename so readers observe
    /// either the old or the new index, never a torn write.
    fn write_index_locked(&self, index: &PackIndex) -> StoreResult<()> {
        let bytes = index
            .to_json_bytes()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let final_path = self.layout.index_path();
        let tmp_path = self.layout.btool_dir().join("index.json.tmp");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&bytes)?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// A defensive copy of the loaded index, for the prune engine.
    pub fn index_snapshot(&self) -> StoreResult<PackIndex> {
        let mut state = self.state.lock().expect("lock poisoned");
        self.load_index_locked(&mut state)?;
        Ok(state.index.clone())
    }

    /// Number of objects currently pending (uncommitted).
    pub fn pending_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").pending.len()
    }
}
