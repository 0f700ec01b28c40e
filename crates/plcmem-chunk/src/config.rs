/// Smallest maximum chunk size the planner accepts: 256 bytes.
pub const MIN_CHUNK_SIZE: usize = 256;

/// Candidate sizes probed by auto-detection, ascending.
pub const DEFAULT_PROBE_CANDIDATES: [usize; 5] = [256, 512, 1024, 2048, 4096];

/// Controls chunk sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Floor for fixed and detected chunk sizes.
    pub min_chunk_size: usize,
    /// Active chunk size before anything is fixed or detected.
    pub initial_chunk_size: usize,
    /// Ascending sizes tried by detection.
    pub probe_candidates: Vec<usize>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: MIN_CHUNK_SIZE,
            initial_chunk_size: MIN_CHUNK_SIZE,
            probe_candidates: DEFAULT_PROBE_CANDIDATES.to_vec(),
        }
    }
}
