use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use btool_store::RepoLayout;
use btool_types::{Digest, SnapManifest};

use crate::error::{SnapsError, SnapsResult};

/// A parsed snapshot manifest together with its on-disk identity.
///
/// The digest comes from the manifest's filename stem and is kept separate
/// from the sequential ID stored inside the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapDetail {
    /// Sequential snapshot ID.
    pub id: u64,
    /// Digest of the manifest file (filename stem).
    pub digest: Digest,
    /// Parsed UTC timestamp.
    pub timestamp: DateTime<Utc>,
    /// User message, possibly empty.
    pub message: String,
    /// Digest of the snapshot's root tree.
    pub root_tree_hash: Digest,
    /// Total source bytes captured.
    pub source_size: u64,
    /// Pack bytes added when the snapshot committed.
    pub snap_size: u64,
}

/// Read-only view over a repository's snapshot-manifest directory.
#[derive(Clone, Debug)]
pub struct SnapCatalog {
    layout: RepoLayout,
}

impl SnapCatalog {
    /// Create a catalog for the repository rooted at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            layout: RepoLayout::new(root),
        }
    }

    /// Enumerate all valid snapshots, sorted by ID ascending.
    ///
    /// Files that are unreadable, unparseable, or carry a malformed
    /// timestamp or filename are skipped with a debug log; a missing snaps
    /// directory means no snapshots, not an error. Duplicate IDs (possible
    /// after a crash between manifest write and counter bump) sort stably
    /// by timestamp then digest.
    pub fn list(&self) -> SnapsResult<Vec<SnapDetail>> {
        let snaps_dir = self.layout.snaps_dir();
        let entries = match fs::read_dir(&snaps_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snaps = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match Self::parse_manifest_file(&path) {
                Some(detail) => snaps.push(detail),
                None => {
                    tracing::debug!(path = %path.display(), "skipping invalid snap manifest");
                }
            }
        }

        snaps.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then(a.timestamp.cmp(&b.timestamp))
                .then(a.digest.cmp(&b.digest))
        });
        Ok(snaps)
    }

    fn parse_manifest_file(path: &Path) -> Option<SnapDetail> {
        let stem = path.file_stem()?.to_str()?;
        let digest = Digest::from_hex(stem).ok()?;
        let content = fs::read(path).ok()?;
        let manifest = SnapManifest::from_bytes(&content).ok()?;
        let timestamp = DateTime::parse_from_rfc3339(&manifest.timestamp)
            .ok()?
            .with_timezone(&Utc);
        Some(SnapDetail {
            id: manifest.id,
            digest,
            timestamp,
            message: manifest.message,
            root_tree_hash: manifest.root_tree_hash,
            source_size: manifest.source_size,
            snap_size: manifest.snap_size,
        })
    }

    /// Resolve a user-supplied identifier to exactly one snapshot.
    ///
    /// A decimal identifier matches by exact ID; anything else is treated as
    /// a hex digest prefix. Zero matches fail with [`SnapsError::NoSnapFound`],
    /// two or more prefix matches with [`SnapsError::Ambiguous`].
    pub fn resolve(&self, identifier: &str) -> SnapsResult<SnapDetail> {
        let snaps = self.list()?;
        if snaps.is_empty() {
            return Err(SnapsError::NoSnapFound(identifier.to_string()));
        }

        if let Ok(id) = identifier.parse::<u64>() {
            return snaps
                .into_iter()
                .find(|s| s.id == id)
                .ok_or_else(|| SnapsError::NoSnapFound(identifier.to_string()));
        }

        let mut matches: Vec<SnapDetail> = snaps
            .into_iter()
            .filter(|s| s.digest.matches_prefix(identifier))
            .collect();
        match matches.len() {
            0 => Err(SnapsError::NoSnapFound(identifier.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(SnapsError::Ambiguous(identifier.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, stem: &str, manifest: &SnapManifest) {
        let bytes = manifest.to_manifest_bytes().unwrap();
        fs::write(dir.join(format!("{stem}.json")), bytes).unwrap();
    }

    fn manifest(id: u64, timestamp: &str, message: &str) -> SnapManifest {
        SnapManifest {
            id,
            timestamp: timestamp.to_string(),
            root_tree_hash: Digest::of(&[id as u8]),
            message: message.to_string(),
            source_size: 100 * id,
            snap_size: 10 * id,
        }
    }

    /// A syntactically valid 64-char hex stem starting with `lead`.
    fn stem(lead: &str) -> String {
        format!("{lead}{}", "0".repeat(64 - lead.len()))
    }

    fn catalog_in(tmp: &tempfile::TempDir) -> SnapCatalog {
        let catalog = SnapCatalog::new(tmp.path());
        RepoLayout::new(tmp.path()).ensure().unwrap();
        catalog
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[test]
    fn missing_snaps_dir_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = SnapCatalog::new(tmp.path());
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn lists_sorted_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();
        write_manifest(&dir, &stem("bb"), &manifest(2, "2026-01-02T00:00:00Z", "second"));
        write_manifest(&dir, &stem("aa"), &manifest(1, "2026-01-01T00:00:00Z", "first"));
        write_manifest(&dir, &stem("cc"), &manifest(3, "2026-01-03T00:00:00Z", "third"));

        let snaps = catalog.list().unwrap();
        let ids: Vec<u64> = snaps.iter().map(|s| s.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(snaps[0].message, "first");
    }

    #[test]
    fn invalid_manifests_are_silently_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();

        write_manifest(&dir, &stem("aa"), &manifest(1, "2026-01-01T00:00:00Z", "good"));
        // Unparseable JSON.
        fs::write(dir.join(format!("{}.json", stem("bb"))), b"{ broken").unwrap();
        // Bad timestamp.
        write_manifest(&dir, &stem("cc"), &manifest(2, "yesterday-ish", "bad time"));
        // Filename stem that is not a digest.
        fs::write(dir.join("not-a-digest.json"), b"{}").unwrap();
        // Wrong extension.
        fs::write(dir.join(format!("{}.txt", stem("dd"))), b"ignored").unwrap();

        let snaps = catalog.list().unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].message, "good");
    }

    #[test]
    fn duplicate_ids_sort_stably_by_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();
        write_manifest(&dir, &stem("bb"), &manifest(1, "2026-01-02T00:00:00Z", "later"));
        write_manifest(&dir, &stem("aa"), &manifest(1, "2026-01-01T00:00:00Z", "earlier"));

        let snaps = catalog.list().unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].message, "earlier");
        assert_eq!(snaps[1].message, "later");
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_by_exact_id() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();
        write_manifest(&dir, &stem("aa"), &manifest(1, "2026-01-01T00:00:00Z", "one"));
        write_manifest(&dir, &stem("bb"), &manifest(2, "2026-01-02T00:00:00Z", "two"));

        let snap = catalog.resolve("2").unwrap();
        assert_eq!(snap.message, "two");
    }

    #[test]
    fn resolve_by_unique_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();
        write_manifest(&dir, &stem("ab"), &manifest(1, "2026-01-01T00:00:00Z", "ab snap"));
        write_manifest(&dir, &stem("cd"), &manifest(2, "2026-01-02T00:00:00Z", "cd snap"));

        let snap = catalog.resolve("ab").unwrap();
        assert_eq!(snap.message, "ab snap");
    }

    #[test]
    fn ambiguous_prefix_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();
        write_manifest(&dir, &stem("aa"), &manifest(1, "2026-01-01T00:00:00Z", ""));
        write_manifest(&dir, &stem("ab"), &manifest(2, "2026-01-02T00:00:00Z", ""));

        let err = catalog.resolve("a").unwrap_err();
        assert!(matches!(err, SnapsError::Ambiguous(_)));
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn unknown_identifier_fails_with_no_snap_found() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let dir = RepoLayout::new(tmp.path()).snaps_dir();
        write_manifest(&dir, &stem("aa"), &manifest(1, "2026-01-01T00:00:00Z", ""));

        let err = catalog.resolve("999").unwrap_err();
        assert!(matches!(err, SnapsError::NoSnapFound(_)));
        assert!(err.to_string().contains("no snap found"));

        let err = catalog.resolve("ffff").unwrap_err();
        assert!(matches!(err, SnapsError::NoSnapFound(_)));
    }

    #[test]
    fn empty_catalog_resolution_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&tmp);
        let err = catalog.resolve("1").unwrap_err();
        assert!(matches!(err, SnapsError::NoSnapFound(_)));
    }
}
