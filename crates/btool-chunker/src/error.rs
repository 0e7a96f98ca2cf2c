/// Errors from chunking operations.
#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    /// The configured chunk size bounds are inconsistent.
    #[error("invalid chunker config: {0}")]
    InvalidConfig(String),

    /// I/O failure while reading the input file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for chunking operations.
pub type ChunkerResult<T> = Result<T, ChunkerError>;
