use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::address::Address;
use crate::config::ChunkConfig;
use crate::error::{ChunkError, Result};

/// Where the active maximum chunk size came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSizeSource {
    /// The configured initial size; nothing fixed or detected yet.
    Default,
    /// Set explicitly by the caller.
    Fixed,
    /// Chosen by probing the controller.
    AutoDetected,
}

/// One sub-range of a chunked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

impl ChunkRange {
    /// One past the last byte of the chunk.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Ascending chunk ranges covering `[0, total)`.
#[derive(Debug, Clone)]
pub struct Chunks {
    next_offset: usize,
    next_index: usize,
    total: usize,
    max: usize,
}

impl Iterator for Chunks {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<ChunkRange> {
        if self.next_offset >= self.total {
            return None;
        }
        let len = self.max.min(self.total - self.next_offset);
        let range = ChunkRange {
            index: self.next_index,
            offset: self.next_offset,
            len,
        };
        self.next_offset += len;
        self.next_index += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total.saturating_sub(self.next_offset)).div_ceil(self.max);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}

/// Splits transfers into chunks no larger than the active maximum chunk size.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    config: ChunkConfig,
    max_chunk_size: usize,
    source: ChunkSizeSource,
}

impl ChunkPlanner {
    /// Create a planner with default configuration.
    pub fn new() -> Self {
        Self::with_config(ChunkConfig::default())
    }

    /// Create a planner with explicit configuration.
    ///
    /// An initial size below the floor is raised to the floor.
    pub fn with_config(config: ChunkConfig) -> Self {
        let max_chunk_size = config.initial_chunk_size.max(config.min_chunk_size).max(1);
        Self {
            config,
            max_chunk_size,
            source: ChunkSizeSource::Default,
        }
    }

    /// Active maximum chunk size in bytes.
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn chunk_size_source(&self) -> ChunkSizeSource {
        self.source
    }

    pub fn is_auto_detected(&self) -> bool {
        self.source == ChunkSizeSource::AutoDetected
    }

    /// Current planner configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Fix the maximum chunk size.
    pub fn set_max_chunk_size(&mut self, size: usize) -> Result<()> {
        if size < self.config.min_chunk_size || size == 0 {
            return Err(ChunkError::ChunkSizeTooSmall {
                size,
                min: self.config.min_chunk_size,
            });
        }
        self.max_chunk_size = size;
        self.source = ChunkSizeSource::Fixed;
        debug!(max_chunk_size = size, "fixed max chunk size");
        Ok(())
    }

    /// Probe candidate sizes in ascending order and adopt the largest one
    /// reached before the first rejection.
    ///
    /// A probe returning `Err` counts as a rejection. When no candidate
    /// succeeds the floor is adopted. Returns the adopted size.
    pub fn detect<F, E>(&mut self, mut probe: F) -> usize
    where
        F: FnMut(usize) -> std::result::Result<bool, E>,
        E: fmt::Display,
    {
        let floor = self.config.min_chunk_size.max(1);
        let mut adopted = floor;

        for &candidate in &self.config.probe_candidates {
            match probe(candidate) {
                Ok(true) => {
                    trace!(candidate, "chunk size accepted");
                    adopted = candidate.max(floor);
                }
                Ok(false) => {
                    debug!(candidate, "chunk size rejected");
                    break;
                }
                Err(err) => {
                    warn!(candidate, error = %err, "chunk size probe failed; keeping last good size");
                    break;
                }
            }
        }

        self.max_chunk_size = adopted;
        self.source = ChunkSizeSource::AutoDetected;
        debug!(max_chunk_size = adopted, "detected max chunk size");
        adopted
    }

    /// Number of chunks needed for `total_size` bytes.
    pub fn calculate_chunk_count(&self, total_size: usize) -> usize {
        total_size.div_ceil(self.max_chunk_size)
    }

    /// The chunk ranges for a transfer of `total_size` bytes.
    pub fn plan(&self, total_size: usize) -> Chunks {
        Chunks {
            next_offset: 0,
            next_index: 0,
            total: total_size,
            max: self.max_chunk_size,
        }
    }

    /// Read `total_size` bytes starting at `base_address`.
    ///
    /// `read` receives each chunk's address and length. Responses longer than
    /// requested are cut; empty or short responses fail with
    /// [`ChunkError::Transfer`]. Errors from `read` are returned unchanged.
    pub fn read_chunked<F, R, E>(
        &self,
        base_address: &str,
        total_size: usize,
        mut read: F,
    ) -> std::result::Result<Bytes, E>
    where
        F: FnMut(&str, usize) -> std::result::Result<R, E>,
        R: AsRef<[u8]>,
        E: From<ChunkError>,
    {
        let base = Address::parse(base_address)?;
        // Grows per chunk.
        let mut out = BytesMut::with_capacity(total_size.min(self.max_chunk_size));

        for range in self.plan(total_size) {
            let address = self.chunk_address(base_address, &base, &range)?;
            trace!(%address, offset = range.offset, len = range.len, "reading chunk");

            let response = read(&address, range.len)?;
            let data = response.as_ref();
            if data.len() < range.len {
                return Err(ChunkError::Transfer {
                    offset: range.offset,
                    expected: range.len,
                    actual: data.len(),
                }
                .into());
            }
            out.put_slice(&data[..range.len]);
        }

        debug!(
            address = base_address,
            total_size,
            chunks = self.calculate_chunk_count(total_size),
            "chunked read complete"
        );
        Ok(out.freeze())
    }

    /// Write `data` starting at `base_address`, one `write` call per chunk.
    ///
    /// Errors from `write` are returned unchanged and stop the transfer.
    pub fn write_chunked<F, E>(
        &self,
        base_address: &str,
        data: &[u8],
        mut write: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(&str, &[u8]) -> std::result::Result<(), E>,
        E: From<ChunkError>,
    {
        let base = Address::parse(base_address)?;

        for range in self.plan(data.len()) {
            let address = self.chunk_address(base_address, &base, &range)?;
            trace!(%address, offset = range.offset, len = range.len, "writing chunk");
            write(&address, &data[range.offset..range.end()])?;
        }

        debug!(
            address = base_address,
            total_size = data.len(),
            chunks = self.calculate_chunk_count(data.len()),
            "chunked write complete"
        );
        Ok(())
    }

    fn chunk_address(&self, original: &str, base: &Address, range: &ChunkRange) -> Result<String> {
        if range.offset == 0 {
            return Ok(original.to_string());
        }
        Ok(base.with_added_offset(range.offset as u64)?.to_string())
    }
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new()
    }
}
