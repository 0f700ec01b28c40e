use plcmem_layout::{Primitive, ShapeError};

/// Errors that can occur while encoding or decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The shape could not be resolved to a layout.
    #[error("layout error: {0}")]
    Shape(#[from] ShapeError),

    /// The buffer is shorter than the layout's total size.
    #[error("buffer too short for {shape} ({actual} bytes, need {expected})")]
    Buffer {
        shape: String,
        expected: usize,
        actual: usize,
    },

    /// The value cannot be stored in the field's kind.
    #[error("field {field}: cannot store {found} as {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    /// A numeric value does not fit the field's storage type.
    #[error("field {field}: {value} is out of range for {primitive}")]
    OutOfRange {
        field: String,
        primitive: Primitive,
        value: String,
    },

    /// An enum value names no variant of the field's enum.
    #[error("field {field}: {variant} is not a variant of {enum_name}")]
    UnknownVariant {
        field: String,
        enum_name: String,
        variant: String,
    },

    /// A typed record conversion found no value for a required field.
    #[error("missing field {0}")]
    MissingField(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
