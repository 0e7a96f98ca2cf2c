use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use btool_store::RepoLayout;

use crate::error::{SnapsError, SnapsResult};

/// Durable monotonic counter handing out snapshot IDs.
///
/// The counter lives in `meta/counter` as a decimal ASCII integer. It is
/// read before a snapshot manifest is written (to fill the ID field) and
/// bumped after the manifest is durably on disk. IDs survive prunes, so a
/// snapshot created after a prune always receives an ID greater than any
/// pruned snapshot's.
pub struct SnapCounter {
    layout: RepoLayout,
    lock: Mutex<()>,
}

impl SnapCounter {
    /// Create a counter for the repository rooted at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            layout: RepoLayout::new(root),
            lock: Mutex::new(()),
        }
    }

    /// The next snapshot ID.
    ///
    /// A missing, empty, or whitespace-only counter file means 1; malformed
    /// content is an error rather than a silent reset, because reusing IDs
    /// would corrupt the catalog's ordering.
    pub fn peek(&self) -> SnapsResult<u64> {
        let _guard = self.lock.lock().expect("lock poisoned");
        self.peek_locked()
    }

    fn peek_locked(&self) -> SnapsResult<u64> {
        let path = self.layout.counter_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(e.into()),
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(1);
        }
        trimmed
            .parse::<u64>()
            .map_err(|e| SnapsError::CorruptCounter(format!("{trimmed:?}: {e}")))
    }

    /// Durably advance the counter to the next ID.
    pub fn bump(&self) -> SnapsResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let next = self.peek_locked()? + 1;
        fs::create_dir_all(self.layout.meta_dir())?;
        let mut file = File::create(self.layout.counter_path())?;
        file.write_all(next.to_string().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_peeks_one() {
        let tmp = tempfile::tempdir().unwrap();
        let counter = SnapCounter::new(tmp.path());
        assert_eq!(counter.peek().unwrap(), 1);
    }

    #[test]
    fn empty_and_whitespace_files_peek_one() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(tmp.path());
        layout.ensure().unwrap();
        let counter = SnapCounter::new(tmp.path());

        fs::write(layout.counter_path(), b"").unwrap();
        assert_eq!(counter.peek().unwrap(), 1);
        fs::write(layout.counter_path(), b"  \n").unwrap();
        assert_eq!(counter.peek().unwrap(), 1);
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(tmp.path());
        layout.ensure().unwrap();
        fs::write(layout.counter_path(), b"7\n").unwrap();
        assert_eq!(SnapCounter::new(tmp.path()).peek().unwrap(), 7);
    }

    #[test]
    fn malformed_content_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(tmp.path());
        layout.ensure().unwrap();
        fs::write(layout.counter_path(), b"not a number").unwrap();
        let err = SnapCounter::new(tmp.path()).peek().unwrap_err();
        assert!(matches!(err, SnapsError::CorruptCounter(_)));
    }

    #[test]
    fn bump_advances_monotonically() {
        let tmp = tempfile::tempdir().unwrap();
        let counter = SnapCounter::new(tmp.path());
        assert_eq!(counter.peek().unwrap(), 1);
        counter.bump().unwrap();
        assert_eq!(counter.peek().unwrap(), 2);
        counter.bump().unwrap();
        counter.bump().unwrap();
        assert_eq!(counter.peek().unwrap(), 4);
    }

    #[test]
    fn bump_creates_meta_dir_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let counter = SnapCounter::new(tmp.path());
        counter.bump().unwrap();
        let on_disk = fs::read_to_string(RepoLayout::new(tmp.path()).counter_path()).unwrap();
        assert_eq!(on_disk, "2");
    }

    #[test]
    fn counter_persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        SnapCounter::new(tmp.path()).bump().unwrap();
        assert_eq!(SnapCounter::new(tmp.path()).peek().unwrap(), 2);
    }
}
