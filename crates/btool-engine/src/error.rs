use std::path::PathBuf;

/// Errors from the snap, restore, and prune engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The caller supplied an unusable target or output path.
    #[error("{0}")]
    UserInput(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the object store.
    #[error(transparent)]
    Store(#[from] btool_store::StoreError),

    /// Error from the snapshot catalog or counter.
    #[error(transparent)]
    Snaps(#[from] btool_snaps::SnapsError),

    /// Error from the chunker.
    #[error(transparent)]
    Chunker(#[from] btool_chunker::ChunkerError),

    /// Error from the data model.
    #[error(transparent)]
    Types(#[from] btool_types::TypeError),

    /// A worker failed while processing one file.
    #[error("failed to process file {path}: {source}")]
    File {
        path: PathBuf,
        source: Box<EngineError>,
    },

    /// Internal consistency violated.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
