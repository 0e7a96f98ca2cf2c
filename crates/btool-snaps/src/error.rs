/// Errors from catalog and counter operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapsError {
    /// No snapshot matched the supplied identifier.
    #[error("no snap found with ID or hash prefix '{0}'")]
    NoSnapFound(String),

    /// A digest prefix matched more than one snapshot.
    #[error("ambiguous snap identifier '{0}' matches multiple snapshots")]
    Ambiguous(String),

    /// The counter file exists but does not hold a decimal integer.
    #[error("corrupt counter file: {0}")]
    CorruptCounter(String),

    /// I/O error reading the snaps directory or counter file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for catalog and counter operations.
pub type SnapsResult<T> = Result<T, SnapsError>;
