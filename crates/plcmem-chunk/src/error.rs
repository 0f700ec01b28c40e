/// Errors that can occur while planning or running a chunked transfer.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The base address cannot be parsed or offset.
    #[error("invalid address {address:?}: {reason}")]
    AddressFormat { address: String, reason: String },

    /// A chunk read returned no usable data.
    #[error("chunk at offset {offset} returned {actual} bytes, expected {expected}")]
    Transfer {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// A fixed chunk size is below the configured floor.
    #[error("chunk size {size} is below the minimum of {min}")]
    ChunkSizeTooSmall { size: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, ChunkError>;
