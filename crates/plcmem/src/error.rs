use plcmem_chunk::ChunkError;
use plcmem_codec::CodecError;
use plcmem_layout::ShapeError;

/// Errors from any plcmem layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Layout resolution error.
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Chunk planning or transfer error.
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// Failure reported by a caller-supplied transport closure.
    #[error("transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a transport failure.
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
