/// Errors that can occur while resolving or registering a shape.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    /// The record declares no fields with an order index.
    #[error("shape {shape} declares no ordered fields")]
    NoOrderedFields { shape: String },

    /// Two fields of one record share an order index.
    #[error("shape {shape} has duplicate order index {order}")]
    DuplicateOrder { shape: String, order: u32 },

    /// A string field (or string array element) has no declared maximum length.
    #[error("string field {shape}.{field} has no max length")]
    MissingStringLength { shape: String, field: String },

    /// An array field has neither an explicit nor an inferred length.
    #[error("array field {shape}.{field} has no resolvable length")]
    UnresolvedArrayLength { shape: String, field: String },

    /// The size of a field cannot be determined.
    #[error("cannot size field {shape}.{field}: {reason}")]
    Unsized {
        shape: String,
        field: String,
        reason: String,
    },

    /// A registry definition references a type that is not known.
    #[error("unknown type {type_name} in {context}")]
    UnknownType { type_name: String, context: String },

    /// A shape or enum with the same name is already registered.
    #[error("{0} is already registered")]
    AlreadyRegistered(String),

    /// A registry definition is not valid JSON or does not match the format.
    #[error("invalid shape definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShapeError>;
