//! Controller memory layouts, binary record codec and chunked transfers.
//!
//! plcmem turns statically declared record shapes into the exact byte image a
//! controller keeps in memory, and moves those images over channels that only
//! accept bounded-size exchanges.
//!
//! # Crate Structure
//!
//! - [`layout`]: Shape model, layout resolution and the process-wide layout cache
//! - [`codec`]: Little-endian record codec over resolved layouts
//! - [`chunk`]: Address arithmetic and chunked read/write planning
//!
//! The transport itself stays with the caller: chunked transfers take
//! closures that perform one bounded exchange each.

pub mod error;
pub mod report;
pub mod transfer;

/// Re-export layout types.
pub mod layout {
    pub use plcmem_layout::*;
}

/// Re-export codec types.
pub mod codec {
    pub use plcmem_codec::*;
}

/// Re-export chunk planning types.
pub mod chunk {
    pub use plcmem_chunk::*;
}

pub use error::{Error, Result};
pub use plcmem_chunk::{calculate_offset_address, ChunkConfig, ChunkPlanner, ChunkSizeSource};
pub use plcmem_codec::{deserialize, serialize, PlcRecord, Record, Value};
pub use plcmem_layout::{
    clear_layout_cache, get_size, resolve, EnumDef, FieldDef, FieldKind, LayoutTable, Primitive,
    RecordShape, Shape, ShapeRegistry,
};
pub use report::{describe, describe_report, FieldReport, LayoutReport};
pub use transfer::{read_record, read_value, write_record, write_value};
