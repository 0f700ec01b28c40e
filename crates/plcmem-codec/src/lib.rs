//! Binary codec for controller record layouts.
//!
//! Encodes a dynamic [`Value`] into the exact byte image described by a
//! resolved [`LayoutTable`](plcmem_layout::LayoutTable), and decodes it back:
//! - Integers and floats are little-endian regardless of host order
//! - Strings occupy their full reserved width, zero-padded, truncated when too long
//! - Absent values leave their bytes zeroed
//!
//! The codec is a pure function of (value, layout, bytes); it never talks to a transport.

pub mod codec;
pub mod error;
pub mod record;
pub mod value;

pub use codec::{decode, deserialize, encode, encode_into, serialize};
pub use error::{CodecError, Result};
pub use record::{deserialize_record, infer_array_lengths, serialize_record, PlcRecord};
pub use value::{Record, Value};
