use btool_types::Digest;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested digest is absent from both the pending set and the index.
    #[error("object {0} not found in index")]
    NotFound(Digest),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The index file exists but cannot be parsed.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Stored bytes for an object are truncated or cannot be decoded as the
    /// requested structured kind.
    #[error("corrupt object {digest}: {reason}")]
    CorruptObject { digest: Digest, reason: String },

    /// Serialization of the index or a structured object failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
