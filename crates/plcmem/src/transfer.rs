//! Record-level transfers.
//!
//! These helpers glue the codec to the chunk planner: a value is encoded
//! against its resolved layout and written chunk by chunk, or read chunk by
//! chunk and decoded. The caller's error type only has to absorb the chunk
//! and codec errors, so transport failures pass through untouched.

use plcmem_chunk::{ChunkError, ChunkPlanner};
use plcmem_codec::{decode, encode, CodecError, PlcRecord, Value};
use plcmem_layout::{resolve, Shape};
use tracing::debug;

/// Read a value of `shape` stored at `address`.
pub fn read_value<F, R, E>(
    planner: &ChunkPlanner,
    shape: &Shape,
    address: &str,
    read: F,
) -> Result<Value, E>
where
    F: FnMut(&str, usize) -> Result<R, E>,
    R: AsRef<[u8]>,
    E: From<ChunkError> + From<CodecError>,
{
    let layout = resolve(shape).map_err(CodecError::from)?;
    let bytes = planner.read_chunked(address, layout.total_size, read)?;
    debug!(shape = %layout.name, address, size = bytes.len(), "value read");
    Ok(decode(&bytes, &layout)?)
}

/// Encode `value` as `shape` and write it to `address`.
pub fn write_value<F, E>(
    planner: &ChunkPlanner,
    shape: &Shape,
    address: &str,
    value: &Value,
    write: F,
) -> Result<(), E>
where
    F: FnMut(&str, &[u8]) -> Result<(), E>,
    E: From<ChunkError> + From<CodecError>,
{
    let layout = resolve(shape).map_err(CodecError::from)?;
    let bytes = encode(value, &layout)?;
    planner.write_chunked(address, &bytes, write)?;
    debug!(shape = %layout.name, address, size = bytes.len(), "value written");
    Ok(())
}

/// Read a typed record stored at `address`.
pub fn read_record<T, F, R, E>(planner: &ChunkPlanner, address: &str, read: F) -> Result<T, E>
where
    T: PlcRecord,
    F: FnMut(&str, usize) -> Result<R, E>,
    R: AsRef<[u8]>,
    E: From<ChunkError> + From<CodecError>,
{
    let value = read_value(planner, &T::layout_shape(), address, read)?;
    Ok(T::from_value(&value)?)
}

/// Write a typed record to `address`.
pub fn write_record<T, F, E>(
    planner: &ChunkPlanner,
    address: &str,
    record: &T,
    write: F,
) -> Result<(), E>
where
    T: PlcRecord,
    F: FnMut(&str, &[u8]) -> Result<(), E>,
    E: From<ChunkError> + From<CodecError>,
{
    write_value(planner, &T::layout_shape(), address, &record.to_value(), write)
}
