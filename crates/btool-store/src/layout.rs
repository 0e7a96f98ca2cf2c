use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the repository directory created inside the target directory.
pub const BTOOL_DIR_NAME: &str = ".btool";

/// Name of the user ignore file read from the target directory root.
pub const IGNORE_FILE_NAME: &str = ".btoolignore";

/// Structured paths for one repository's on-disk state.
///
/// ```text
/// <root>/.btool/
///   index.json     digest -> { packHash, offset, length }
///   packs/<digest> raw concatenated object bytes
///   snaps/<digest>.json
///   meta/counter   decimal next snapshot ID
/// ```
#[derive(Clone, Debug)]
pub struct RepoLayout {
    root: PathBuf,
}

impl RepoLayout {
    /// Describe the repository layout under `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// The target directory this repository snapshots.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/.btool`
    pub fn btool_dir(&self) -> PathBuf {
        self.root.join(BTOOL_DIR_NAME)
    }

    /// `<root>/.btool/packs`
    pub fn packs_dir(&self) -> PathBuf {
        self.btool_dir().join("packs")
    }

    /// `<root>/.btool/snaps`
    pub fn snaps_dir(&self) -> PathBuf {
        self.btool_dir().join("snaps")
    }

    /// `<root>/.btool/meta`
    pub fn meta_dir(&self) -> PathBuf {
        self.btool_dir().join("meta")
    }

    /// `<root>/.btool/index.json`
    pub fn index_path(&self) -> PathBuf {
        self.btool_dir().join("index.json")
    }

    /// `<root>/.btool/meta/counter`
    pub fn counter_path(&self) -> PathBuf {
        self.meta_dir().join("counter")
    }

    /// `<root>/.btoolignore`
    pub fn ignore_file(&self) -> PathBuf {
        self.root.join(IGNORE_FILE_NAME)
    }

    /// Create the repository subdirectories if they are missing. Idempotent.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(self.packs_dir())?;
        fs::create_dir_all(self.snaps_dir())?;
        fs::create_dir_all(self.meta_dir())?;
        Ok(())
    }
}
