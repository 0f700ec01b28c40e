use bytes::{Buf, BufMut, Bytes, BytesMut};
use plcmem_layout::{resolve, LayoutTable, Primitive, Shape, SlotKind};
use tracing::trace;

use crate::error::{CodecError, Result};
use crate::value::{Record, Value};

/// Serialize a value into exactly `get_size(shape)` bytes.
pub fn serialize(value: &Value, shape: &Shape) -> Result<Bytes> {
    let layout = resolve(shape)?;
    encode(value, &layout)
}

/// Deserialize a value from a buffer at least `get_size(shape)` bytes long.
pub fn deserialize(src: &[u8], shape: &Shape) -> Result<Value> {
    let layout = resolve(shape)?;
    decode(src, &layout)
}

/// Encode a value into a fresh zeroed buffer of the layout's total size.
pub fn encode(value: &Value, layout: &LayoutTable) -> Result<Bytes> {
    let mut buf = BytesMut::zeroed(layout.total_size);
    encode_into(value, layout, &mut buf)?;
    trace!(shape = %layout.name, size = buf.len(), "encoded record");
    Ok(buf.freeze())
}

/// Encode a value into the first `total_size` bytes of `dst`.
///
/// Bytes belonging to absent or null values are left untouched, so `dst`
/// should start zeroed.
pub fn encode_into(value: &Value, layout: &LayoutTable, dst: &mut [u8]) -> Result<()> {
    if dst.len() < layout.total_size {
        return Err(CodecError::Buffer {
            shape: layout.name.clone(),
            expected: layout.total_size,
            actual: dst.len(),
        });
    }
    encode_layout(value, layout, &mut dst[..layout.total_size])
}

/// Decode a value from the first `total_size` bytes of `src`.
pub fn decode(src: &[u8], layout: &LayoutTable) -> Result<Value> {
    if src.len() < layout.total_size {
        return Err(CodecError::Buffer {
            shape: layout.name.clone(),
            expected: layout.total_size,
            actual: src.len(),
        });
    }
    Ok(decode_layout(&src[..layout.total_size], layout))
}

fn encode_layout(value: &Value, layout: &LayoutTable, dst: &mut [u8]) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }
    if let Some(primitive) = layout.leaf {
        return write_primitive(primitive, value, dst, &layout.name);
    }

    let record = match value {
        Value::Record(record) => record,
        other => {
            return Err(CodecError::TypeMismatch {
                field: layout.name.clone(),
                expected: layout.name.clone(),
                found: other.kind_name(),
            })
        }
    };

    for field in &layout.fields {
        if let Some(value) = record.get(&field.name) {
            encode_slot(&field.kind, value, &mut dst[field.offset..field.end()], &field.name)?;
        }
    }
    Ok(())
}

fn encode_slot(kind: &SlotKind, value: &Value, dst: &mut [u8], field: &str) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }

    match kind {
        SlotKind::Primitive(primitive) => write_primitive(*primitive, value, dst, field),
        SlotKind::Enum { def, storage } => {
            let raw = match value {
                Value::Enum(name) | Value::Str(name) => {
                    def.value_of(name)
                        .ok_or_else(|| CodecError::UnknownVariant {
                            field: field.to_string(),
                            enum_name: def.name.clone(),
                            variant: name.clone(),
                        })?
                        .into()
                }
                other => to_integer(other, *storage, field)?,
            };
            write_integer(*storage, raw, dst, field)
        }
        SlotKind::String { max_len } => match value {
            Value::Str(text) => {
                let encoded = truncate_utf8(text, *max_len);
                dst[..encoded.len()].copy_from_slice(encoded);
                Ok(())
            }
            other => Err(mismatch(field, kind, other)),
        },
        SlotKind::Nested(layout) => encode_layout(value, layout, dst),
        SlotKind::Array {
            element,
            len,
            stride,
        } => match value {
            Value::Array(items) => {
                for (index, item) in items.iter().take(*len).enumerate() {
                    let start = index * stride;
                    encode_slot(element, item, &mut dst[start..start + stride], field)?;
                }
                Ok(())
            }
            other => Err(mismatch(field, kind, other)),
        },
    }
}

fn write_primitive(primitive: Primitive, value: &Value, dst: &mut [u8], field: &str) -> Result<()> {
    let mut dst = dst;
    match primitive {
        Primitive::Bool => {
            let flag = match value {
                Value::Bool(b) => *b,
                Value::Int(i) => *i != 0,
                Value::UInt(u) => *u != 0,
                other => return Err(mismatch(field, &SlotKind::Primitive(primitive), other)),
            };
            dst.put_u8(u8::from(flag));
            Ok(())
        }
        Primitive::F32 => {
            let wide = to_float(value, primitive, field)?;
            // Infinities and NaN carry over; finite values must not saturate.
            if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                return Err(CodecError::OutOfRange {
                    field: field.to_string(),
                    primitive,
                    value: wide.to_string(),
                });
            }
            dst.put_f32_le(wide as f32);
            Ok(())
        }
        Primitive::F64 => {
            dst.put_f64_le(to_float(value, primitive, field)?);
            Ok(())
        }
        integer => {
            let raw = to_integer(value, integer, field)?;
            write_integer(integer, raw, dst, field)
        }
    }
}

fn write_integer(primitive: Primitive, raw: i128, dst: &mut [u8], field: &str) -> Result<()> {
    let out_of_range = || CodecError::OutOfRange {
        field: field.to_string(),
        primitive,
        value: raw.to_string(),
    };

    let mut dst = dst;
    match primitive {
        Primitive::I8 => dst.put_i8(i8::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::U8 => dst.put_u8(u8::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::I16 => dst.put_i16_le(i16::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::U16 => dst.put_u16_le(u16::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::I32 => dst.put_i32_le(i32::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::U32 => dst.put_u32_le(u32::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::I64 => dst.put_i64_le(i64::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::U64 => dst.put_u64_le(u64::try_from(raw).map_err(|_| out_of_range())?),
        Primitive::Bool | Primitive::F32 | Primitive::F64 => return Err(out_of_range()),
    }
    Ok(())
}

fn to_integer(value: &Value, primitive: Primitive, field: &str) -> Result<i128> {
    match value {
        Value::Int(i) => Ok(i128::from(*i)),
        Value::UInt(u) => Ok(i128::from(*u)),
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
            if f.abs() < 2f64.powi(64) {
                Ok(*f as i128)
            } else {
                Err(CodecError::OutOfRange {
                    field: field.to_string(),
                    primitive,
                    value: f.to_string(),
                })
            }
        }
        Value::Float(f) => Err(CodecError::OutOfRange {
            field: field.to_string(),
            primitive,
            value: f.to_string(),
        }),
        other => Err(mismatch(field, &SlotKind::Primitive(primitive), other)),
    }
}

fn to_float(value: &Value, primitive: Primitive, field: &str) -> Result<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        other => Err(mismatch(field, &SlotKind::Primitive(primitive), other)),
    }
}

fn mismatch(field: &str, kind: &SlotKind, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        field: field.to_string(),
        expected: kind.describe(),
        found: found.kind_name(),
    }
}

/// Longest prefix of `text` that fits in `max_len` bytes without splitting a character.
fn truncate_utf8(text: &str, max_len: usize) -> &[u8] {
    if text.len() <= max_len {
        return text.as_bytes();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}

fn decode_layout(src: &[u8], layout: &LayoutTable) -> Value {
    if let Some(primitive) = layout.leaf {
        return read_primitive(primitive, src);
    }

    let record: Record = layout
        .fields
        .iter()
        .map(|field| {
            let value = decode_slot(&field.kind, &src[field.offset..field.end()]);
            (field.name.clone(), value)
        })
        .collect();
    Value::Record(record)
}

fn decode_slot(kind: &SlotKind, src: &[u8]) -> Value {
    match kind {
        SlotKind::Primitive(primitive) => read_primitive(*primitive, src),
        SlotKind::Enum { def, storage } => {
            let raw = read_primitive(*storage, src);
            match raw.as_i64().and_then(|value| def.name_of(value)) {
                Some(name) => Value::Enum(name.to_string()),
                None => raw,
            }
        }
        SlotKind::String { .. } => {
            let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
            Value::Str(String::from_utf8_lossy(&src[..end]).into_owned())
        }
        SlotKind::Nested(layout) => decode_layout(src, layout),
        SlotKind::Array {
            element,
            len,
            stride,
        } => Value::Array(
            (0..*len)
                .map(|index| {
                    let start = index * stride;
                    decode_slot(element, &src[start..start + stride])
                })
                .collect(),
        ),
    }
}

fn read_primitive(primitive: Primitive, src: &[u8]) -> Value {
    let mut src = src;
    match primitive {
        Primitive::Bool => Value::Bool(src.get_u8() != 0),
        Primitive::I8 => Value::Int(src.get_i8().into()),
        Primitive::U8 => Value::UInt(src.get_u8().into()),
        Primitive::I16 => Value::Int(src.get_i16_le().into()),
        Primitive::U16 => Value::UInt(src.get_u16_le().into()),
        Primitive::I32 => Value::Int(src.get_i32_le().into()),
        Primitive::U32 => Value::UInt(src.get_u32_le().into()),
        Primitive::I64 => Value::Int(src.get_i64_le()),
        Primitive::U64 => Value::UInt(src.get_u64_le()),
        Primitive::F32 => Value::Float(src.get_f32_le().into()),
        Primitive::F64 => Value::Float(src.get_f64_le()),
    }
}
