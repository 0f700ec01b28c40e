//! Chunked transfer planning over bounded-size controller exchanges.
//!
//! Splits a logical read or write of N bytes at a base address into
//! consecutive sub-transfers no larger than the active maximum chunk size:
//! - Each chunk's address is the base with its byte offset (component 3) advanced
//! - Reads are reassembled in offset order; writes are dispatched in offset order
//! - The maximum chunk size is fixed by the caller or probed against the controller
//!
//! The planner is byte-oriented and never sees record layouts or a transport;
//! the actual exchanges are caller-supplied closures.

pub mod address;
pub mod config;
pub mod error;
pub mod planner;

pub use address::{calculate_offset_address, Address, MIN_COMPONENTS, OFFSET_COMPONENT};
pub use config::{ChunkConfig, DEFAULT_PROBE_CANDIDATES, MIN_CHUNK_SIZE};
pub use error::{ChunkError, Result};
pub use planner::{ChunkPlanner, ChunkRange, ChunkSizeSource, Chunks};
