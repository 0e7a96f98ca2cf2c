use crate::error::{ChunkerError, ChunkerResult};

/// Minimum chunk size: 4 KiB. No boundary is considered before this point.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Target average chunk size: 8 KiB. Drives the boundary selection mask.
pub const AVG_CHUNK_SIZE: usize = 8 * 1024;

/// Maximum chunk size: 16 KiB. A boundary is forced at this point.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Rolling-fingerprint window size in bytes.
pub const WINDOW_SIZE: usize = 64;

/// Chunk size bounds for the content-defined chunker.
///
/// `avg` must be a power of two: the boundary predicate masks the fingerprint
/// with `avg - 1`, which selects boundaries with probability `1/avg` per byte
/// and yields chunks of roughly `avg` bytes between `min` and `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkerConfig {
    min: usize,
    avg: usize,
    max: usize,
}

impl ChunkerConfig {
    /// Create a config, validating `0 < min <= avg <= max` and that `avg` is
    /// a power of two.
    pub fn new(min: usize, avg: usize, max: usize) -> ChunkerResult<Self> {
        if min == 0 {
            return Err(ChunkerError::InvalidConfig(
                "minimum chunk size must be positive".into(),
            ));
        }
        if min > avg || avg > max {
            return Err(ChunkerError::InvalidConfig(format!(
                "chunk sizes must satisfy min <= avg <= max, got {min}/{avg}/{max}"
            )));
        }
        if !avg.is_power_of_two() {
            return Err(ChunkerError::InvalidConfig(format!(
                "average chunk size must be a power of two, got {avg}"
            )));
        }
        Ok(Self { min, avg, max })
    }

    /// Minimum chunk size in bytes.
    pub fn min(&self) -> usize {
        self.min
    }

    /// Target average chunk size in bytes.
    pub fn avg(&self) -> usize {
        self.avg
    }

    /// Maximum chunk size in bytes.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Fingerprint mask implementing the boundary predicate for `avg`.
    pub(crate) fn boundary_mask(&self) -> u64 {
        (self.avg as u64) - 1
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min: MIN_CHUNK_SIZE,
            avg: AVG_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        }
    }
}
