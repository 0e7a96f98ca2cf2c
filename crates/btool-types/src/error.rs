/// Errors from the core data model.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A digest string was not valid hex.
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),

    /// A digest string had the wrong decoded length.
    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Serialization or deserialization of a structured object failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while hashing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for data-model operations.
pub type TypeResult<T> = Result<T, TypeError>;
