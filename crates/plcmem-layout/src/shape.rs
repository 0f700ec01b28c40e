use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Scalar types with a fixed controller width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Primitive {
    /// Every primitive, in width order.
    pub const ALL: [Primitive; 11] = [
        Primitive::Bool,
        Primitive::I8,
        Primitive::U8,
        Primitive::I16,
        Primitive::U16,
        Primitive::I32,
        Primitive::U32,
        Primitive::I64,
        Primitive::U64,
        Primitive::F32,
        Primitive::F64,
    ];

    /// Natural width in bytes.
    pub fn width(self) -> usize {
        match self {
            Primitive::Bool | Primitive::I8 | Primitive::U8 => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
        }
    }

    /// Alignment inside a record. 64-bit values align to the 4-byte controller word.
    pub fn align(self) -> usize {
        self.width().min(4)
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Primitive::Bool | Primitive::F32 | Primitive::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// Lowercase type name, as used in registry definitions.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I8 => "i8",
            Primitive::U8 => "u8",
            Primitive::I16 => "i16",
            Primitive::U16 => "u16",
            Primitive::I32 => "i32",
            Primitive::U32 => "u32",
            Primitive::I64 => "i64",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    /// Look up a primitive by its lowercase type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An enumeration stored as an integer primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumDef {
    pub name: String,
    pub backing: Primitive,
    pub variants: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, backing: Primitive) -> Self {
        Self {
            name: name.into(),
            backing,
            variants: Vec::new(),
        }
    }

    /// Add a named discriminant.
    pub fn variant(mut self, name: impl Into<String>, value: i64) -> Self {
        self.variants.push((name.into(), value));
        self
    }

    /// Discriminant for a variant name.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(variant, _)| variant == name)
            .map(|(_, value)| *value)
    }

    /// Variant name for a discriminant.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

/// The declared kind of a record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Primitive(Primitive),
    /// UTF-8 text in a fixed reserved width (see [`FieldDef::max_length`]).
    String,
    /// Fixed-length sequence of the element kind.
    Array(Box<FieldKind>),
    Nested(Arc<Shape>),
    Enum(Arc<EnumDef>),
}

impl FieldKind {
    pub fn array_of(element: FieldKind) -> Self {
        FieldKind::Array(Box::new(element))
    }

    pub fn nested(shape: impl Into<Shape>) -> Self {
        FieldKind::Nested(Arc::new(shape.into()))
    }

    pub fn enumeration(def: EnumDef) -> Self {
        FieldKind::Enum(Arc::new(def))
    }
}

/// One declared member of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: String,
    /// Declaration-order index. Fields without one are not part of the layout.
    pub order: Option<u32>,
    pub kind: FieldKind,
    /// Storage type replacing the declared primitive or enum backing.
    pub storage: Option<Primitive>,
    /// Reserved byte width for strings.
    pub max_length: Option<usize>,
    /// Explicit array length.
    pub array_length: Option<usize>,
    /// Array length observed on a default-constructed instance.
    pub inferred_length: Option<usize>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, order: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            order: Some(order),
            kind,
            storage: None,
            max_length: None,
            array_length: None,
            inferred_length: None,
        }
    }

    /// A member that is declared but never laid out.
    pub fn unordered(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            order: None,
            ..Self::new(name, 0, kind)
        }
    }

    pub fn primitive(name: impl Into<String>, order: u32, primitive: Primitive) -> Self {
        Self::new(name, order, FieldKind::Primitive(primitive))
    }

    pub fn string(name: impl Into<String>, order: u32, max_length: usize) -> Self {
        Self::new(name, order, FieldKind::String).with_max_length(max_length)
    }

    pub fn array(name: impl Into<String>, order: u32, element: FieldKind, length: usize) -> Self {
        Self::new(name, order, FieldKind::array_of(element)).with_array_length(length)
    }

    pub fn nested(name: impl Into<String>, order: u32, shape: impl Into<Shape>) -> Self {
        Self::new(name, order, FieldKind::nested(shape))
    }

    pub fn enumeration(name: impl Into<String>, order: u32, def: EnumDef) -> Self {
        Self::new(name, order, FieldKind::enumeration(def))
    }

    pub fn with_storage(mut self, storage: Primitive) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_array_length(mut self, length: usize) -> Self {
        self.array_length = Some(length);
        self
    }

    pub fn with_inferred_length(mut self, length: usize) -> Self {
        self.inferred_length = Some(length);
        self
    }
}

/// A named record: an ordered set of field declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordShape {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl RecordShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Fields that carry an order index, in declaration sequence.
    pub fn ordered_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.order.is_some())
    }
}

/// A shape description: either a bare primitive or a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Primitive(Primitive),
    Record(RecordShape),
}

impl Shape {
    pub fn name(&self) -> &str {
        match self {
            Shape::Primitive(p) => p.name(),
            Shape::Record(record) => &record.name,
        }
    }

    pub fn as_record(&self) -> Option<&RecordShape> {
        match self {
            Shape::Record(record) => Some(record),
            Shape::Primitive(_) => None,
        }
    }
}

impl From<Primitive> for Shape {
    fn from(primitive: Primitive) -> Self {
        Shape::Primitive(primitive)
    }
}

impl From<RecordShape> for Shape {
    fn from(record: RecordShape) -> Self {
        Shape::Record(record)
    }
}
