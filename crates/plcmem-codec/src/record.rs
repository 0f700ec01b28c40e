use std::sync::Arc;

use bytes::Bytes;
use plcmem_layout::{FieldKind, Shape};

use crate::codec::{deserialize, serialize};
use crate::error::Result;
use crate::value::Value;

/// A Rust type with a statically declared controller shape.
///
/// Implementors declare the shape once and convert to and from [`Value`].
/// Types that can be default-constructed should return their default value
/// from [`PlcRecord::prototype`] so array lengths missing from the schema can
/// be inferred from it.
pub trait PlcRecord: Sized {
    /// The declared shape of the record.
    fn shape() -> Shape;

    fn to_value(&self) -> Value;

    fn from_value(value: &Value) -> Result<Self>;

    /// A default-constructed instance, used for array length inference.
    fn prototype() -> Option<Value> {
        None
    }

    /// The declared shape with array lengths inferred from the prototype.
    fn layout_shape() -> Shape {
        let shape = Self::shape();
        match Self::prototype() {
            Some(prototype) => infer_array_lengths(&shape, &prototype),
            None => shape,
        }
    }
}

/// Serialize a typed record.
pub fn serialize_record<T: PlcRecord>(record: &T) -> Result<Bytes> {
    serialize(&record.to_value(), &T::layout_shape())
}

/// Deserialize a typed record.
pub fn deserialize_record<T: PlcRecord>(src: &[u8]) -> Result<T> {
    let value = deserialize(src, &T::layout_shape())?;
    T::from_value(&value)
}

/// Fill the inferred length of array fields from a prototype value.
///
/// Fields with an explicit length are left alone, as are fields whose
/// prototype value is missing or not an array. Nested records are visited
/// with the matching nested prototype, and arrays of records with their
/// first prototype element.
pub fn infer_array_lengths(shape: &Shape, prototype: &Value) -> Shape {
    let Shape::Record(record) = shape else {
        return shape.clone();
    };

    let mut record = record.clone();
    for field in &mut record.fields {
        let Some(sample) = prototype.get(&field.name) else {
            continue;
        };
        match &field.kind {
            FieldKind::Array(element) => {
                let Value::Array(items) = sample else {
                    continue;
                };
                if field.array_length.is_none() {
                    field.inferred_length = Some(items.len());
                }
                // Element records are inferred from the first prototype element.
                if let (FieldKind::Nested(nested), Some(first)) = (element.as_ref(), items.first()) {
                    let inferred = infer_array_lengths(nested, first);
                    if inferred != **nested {
                        field.kind = FieldKind::array_of(FieldKind::Nested(Arc::new(inferred)));
                    }
                }
            }
            FieldKind::Nested(nested) => {
                let inferred = infer_array_lengths(nested, sample);
                if inferred != **nested {
                    field.kind = FieldKind::Nested(Arc::new(inferred));
                }
            }
            _ => {}
        }
    }
    Shape::Record(record)
}
