use std::fs;
use std::path::Path;

use btool_types::Digest;

use crate::config::ChunkerConfig;
use crate::error::ChunkerResult;
use crate::rabin::RollingHash;

/// One chunk emitted by the chunker: digest, length, and the raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Digest of `data`.
    pub hash: Digest,
    /// Length of `data` in bytes.
    pub size: u64,
    /// The chunk's bytes.
    pub data: Vec<u8>,
}

/// Split an in-memory byte slice into content-defined chunks.
///
/// Returns the chunks in order plus the total input length. The
/// concatenation of the chunks' bytes is exactly `data`; an empty input
/// yields no chunks. Boundaries are deterministic: the same bytes always
/// produce the same chunk sequence.
pub fn chunk_bytes(data: &[u8], config: &ChunkerConfig) -> (Vec<Chunk>, u64) {
    let mut chunks = Vec::new();
    let mut hash = RollingHash::new();
    let mask = config.boundary_mask();

    let mut start = 0;
    while start < data.len() {
        let remaining = data.len() - start;
        let len = if remaining <= config.min() {
            // Tail shorter than the minimum becomes one final chunk. This
            // also covers whole files smaller than the minimum.
            remaining
        } else {
            let limit = remaining.min(config.max());
            hash.reset();
            let mut cut = limit;
            for (i, &byte) in data[start..start + limit].iter().enumerate() {
                hash.slide(byte);
                // The fingerprint is consulted only once min bytes are in
                // the chunk; before that no boundary is possible.
                if i + 1 >= config.min() && hash.digest() & mask == mask {
                    cut = i + 1;
                    break;
                }
            }
            cut
        };

        let bytes = data[start..start + len].to_vec();
        chunks.push(Chunk {
            hash: Digest::of(&bytes),
            size: len as u64,
            data: bytes,
        });
        start += len;
    }

    (chunks, data.len() as u64)
}

/// Read a file from disk and split it into content-defined chunks.
///
/// The whole file is read into memory before chunking; the caller bounds
/// concurrency so that at most one file per worker is resident at a time.
/// I/O failure surfaces as an error, never as a partial chunk list.
pub fn chunk_file(path: &Path, config: &ChunkerConfig) -> ChunkerResult<(Vec<Chunk>, u64)> {
    let content = fs::read(path)?;
    Ok(chunk_bytes(&content, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Deterministic pseudo-random bytes (xorshift), so boundary behaviour
    /// is reproducible without an RNG dependency.
    fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
        let mut state = seed | 1;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    fn concat(chunks: &[Chunk]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.data.clone()).collect()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let (chunks, total) = chunk_bytes(&[], &ChunkerConfig::default());
        assert!(chunks.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn input_below_min_is_single_chunk() {
        let data = b"tiny file".to_vec();
        let (chunks, total) = chunk_bytes(&data, &ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(total, data.len() as u64);
        assert_eq!(chunks[0].data, data);
        assert_eq!(chunks[0].hash, Digest::of(&data));
    }

    #[test]
    fn concatenation_identity() {
        let data = pseudo_random(200_000, 42);
        let (chunks, total) = chunk_bytes(&data, &ChunkerConfig::default());
        assert_eq!(total, data.len() as u64);
        assert_eq!(concat(&chunks), data);
    }

    #[test]
    fn sizes_sum_to_total() {
        let data = pseudo_random(100_000, 7);
        let (chunks, total) = chunk_bytes(&data, &ChunkerConfig::default());
        let sum: u64 = chunks.iter().map(|c| c.size).sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn chunk_sizes_respect_bounds() {
        let config = ChunkerConfig::default();
        let data = pseudo_random(500_000, 99);
        let (chunks, _) = chunk_bytes(&data, &config);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.size as usize >= config.min());
            assert!(chunk.size as usize <= config.max());
        }
        // The final chunk may be short but never oversized.
        assert!(chunks.last().unwrap().size as usize <= config.max());
    }

    #[test]
    fn boundaries_are_deterministic() {
        let data = pseudo_random(150_000, 3);
        let (a, _) = chunk_bytes(&data, &ChunkerConfig::default());
        let (b, _) = chunk_bytes(&data, &ChunkerConfig::default());
        let a_cuts: Vec<u64> = a.iter().map(|c| c.size).collect();
        let b_cuts: Vec<u64> = b.iter().map(|c| c.size).collect();
        assert_eq!(a_cuts, b_cuts);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.hash, y.hash);
        }
    }

    #[test]
    fn uniform_data_chunks_stay_within_bounds() {
        // A constant byte stream settles the fingerprint into a fixed cycle,
        // so every chunk is the same size and within bounds.
        let config = ChunkerConfig::default();
        let data = vec![0xAAu8; 200_000];
        let (chunks, _) = chunk_bytes(&data, &config);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.size as usize >= config.min());
            assert!(chunk.size as usize <= config.max());
        }
        assert_eq!(concat(&chunks), data);
    }

    #[test]
    fn shared_suffix_shares_tail_chunks() {
        // Prepending data shifts only nearby boundaries: the tails of both
        // chunk sequences converge to identical chunks.
        let base = pseudo_random(300_000, 11);
        let mut shifted = pseudo_random(10_000, 12);
        shifted.extend_from_slice(&base);

        let (a, _) = chunk_bytes(&base, &ChunkerConfig::default());
        let (b, _) = chunk_bytes(&shifted, &ChunkerConfig::default());

        let a_hashes: Vec<_> = a.iter().map(|c| c.hash).collect();
        let b_hashes: Vec<_> = b.iter().map(|c| c.hash).collect();
        let shared = a_hashes
            .iter()
            .rev()
            .zip(b_hashes.iter().rev())
            .take_while(|(x, y)| x == y)
            .count();
        assert!(
            shared >= a_hashes.len() / 2,
            "expected most tail chunks shared, got {shared} of {}",
            a_hashes.len()
        );
    }

    #[test]
    fn chunk_file_matches_chunk_bytes() {
        let data = pseudo_random(50_000, 5);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();

        let (from_file, file_total) =
            chunk_file(tmp.path(), &ChunkerConfig::default()).unwrap();
        let (from_bytes, bytes_total) = chunk_bytes(&data, &ChunkerConfig::default());
        assert_eq!(file_total, bytes_total);
        assert_eq!(from_file, from_bytes);
    }

    #[test]
    fn chunk_file_missing_path_is_io_error() {
        let err = chunk_file(Path::new("/no/such/file"), &ChunkerConfig::default());
        assert!(matches!(err, Err(crate::ChunkerError::Io(_))));
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let (chunks, total) = chunk_file(tmp.path(), &ChunkerConfig::default()).unwrap();
        assert!(chunks.is_empty());
        assert_eq!(total, 0);
    }
}
