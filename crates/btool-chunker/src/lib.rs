//! Content-defined chunking for the btool snapshot engine.
//!
//! Splits a byte stream into variable-sized chunks at boundaries chosen by a
//! Rabin rolling fingerprint of the content. Because boundaries depend on the
//! bytes themselves rather than on fixed offsets, inserting or deleting data
//! shifts only nearby boundaries and leaves the rest of the chunk sequence,
//! and therefore its deduplication identity, intact.
//!
//! The fingerprint parameters (polynomial, window size, chunk size bounds)
//! are part of a repository's compatibility surface: changing any of them
//! changes chunk boundaries and invalidates deduplication against existing
//! snapshots.

pub mod chunker;
pub mod config;
pub mod error;
mod rabin;

pub use chunker::{chunk_bytes, chunk_file, Chunk};
pub use config::{ChunkerConfig, AVG_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, WINDOW_SIZE};
pub use error::{ChunkerError, ChunkerResult};
