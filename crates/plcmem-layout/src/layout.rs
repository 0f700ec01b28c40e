use std::sync::Arc;

use crate::cache::LayoutCache;
use crate::error::{Result, ShapeError};
use crate::shape::{EnumDef, FieldDef, FieldKind, Primitive, RecordShape, Shape};

/// Controller word size. Record sizes are padded to this and no field aligns beyond it.
pub const WORD_ALIGN: usize = 4;

/// The resolved storage kind of one slot in a layout.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    Primitive(Primitive),
    Enum {
        def: Arc<EnumDef>,
        storage: Primitive,
    },
    String {
        max_len: usize,
    },
    Nested(Arc<LayoutTable>),
    Array {
        element: Box<SlotKind>,
        len: usize,
        stride: usize,
    },
}

impl SlotKind {
    /// Reserved byte width of the slot.
    pub fn size(&self) -> usize {
        match self {
            SlotKind::Primitive(p) => p.width(),
            SlotKind::Enum { storage, .. } => storage.width(),
            SlotKind::String { max_len } => *max_len,
            SlotKind::Nested(layout) => layout.total_size,
            SlotKind::Array { len, stride, .. } => len * stride,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            SlotKind::Primitive(p) => p.align(),
            SlotKind::Enum { storage, .. } => storage.align(),
            SlotKind::String { .. } | SlotKind::Nested(_) | SlotKind::Array { .. } => WORD_ALIGN,
        }
    }

    /// Short human-readable type description.
    pub fn describe(&self) -> String {
        match self {
            SlotKind::Primitive(p) => p.name().to_string(),
            SlotKind::Enum { def, storage } => format!("enum {}({storage})", def.name),
            SlotKind::String { max_len } => format!("string({max_len})"),
            SlotKind::Nested(layout) => layout.name.clone(),
            SlotKind::Array { element, len, .. } => format!("{}[{len}]", element.describe()),
        }
    }
}

/// Placement of one ordered field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub order: u32,
    pub offset: usize,
    pub size: usize,
    pub kind: SlotKind,
}

impl FieldLayout {
    /// One past the last byte of the field.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    pub fn nested(&self) -> Option<&Arc<LayoutTable>> {
        match &self.kind {
            SlotKind::Nested(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match &self.kind {
            SlotKind::Array { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Max length of a string field, or of the elements of a string array.
    pub fn string_max_len(&self) -> Option<usize> {
        match &self.kind {
            SlotKind::String { max_len } => Some(*max_len),
            SlotKind::Array { element, .. } => match element.as_ref() {
                SlotKind::String { max_len } => Some(*max_len),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Immutable offset/size table for a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutTable {
    pub name: String,
    pub total_size: usize,
    /// Set when the shape is a bare primitive; `fields` is then empty.
    pub leaf: Option<Primitive>,
    pub fields: Vec<FieldLayout>,
}

impl LayoutTable {
    fn leaf(primitive: Primitive) -> Self {
        Self {
            name: primitive.name().to_string(),
            total_size: primitive.width(),
            leaf: Some(primitive),
            fields: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Field offsets in layout order.
    pub fn offsets(&self) -> Vec<usize> {
        self.fields.iter().map(|field| field.offset).collect()
    }
}

/// Compute the layout for a shape. Nested records resolve through `cache`.
pub(crate) fn compute(shape: &Shape, cache: &LayoutCache) -> Result<LayoutTable> {
    let record = match shape {
        Shape::Primitive(primitive) => return Ok(LayoutTable::leaf(*primitive)),
        Shape::Record(record) => record,
    };

    let mut ordered: Vec<(u32, &FieldDef)> = record
        .fields
        .iter()
        .filter_map(|field| field.order.map(|order| (order, field)))
        .collect();

    if ordered.is_empty() {
        return Err(ShapeError::NoOrderedFields {
            shape: record.name.clone(),
        });
    }

    ordered.sort_by_key(|(order, _)| *order);
    if let Some(pair) = ordered.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(ShapeError::DuplicateOrder {
            shape: record.name.clone(),
            order: pair[0].0,
        });
    }

    let mut cursor = 0usize;
    let mut fields = Vec::with_capacity(ordered.len());
    for (order, def) in ordered {
        let kind = field_slot(record, def, cache)?;
        let size = kind.size();
        let offset = align_up(cursor, kind.align())
            .ok_or_else(|| address_overflow(record, def))?;
        cursor = offset
            .checked_add(size)
            .ok_or_else(|| address_overflow(record, def))?;
        fields.push(FieldLayout {
            name: def.name.clone(),
            order,
            offset,
            size,
            kind,
        });
    }

    let total_size = align_up(cursor, WORD_ALIGN).ok_or_else(|| ShapeError::Unsized {
        shape: record.name.clone(),
        field: fields.last().map(|f| f.name.clone()).unwrap_or_default(),
        reason: "record size overflows the address space".to_string(),
    })?;

    Ok(LayoutTable {
        name: record.name.clone(),
        total_size,
        leaf: None,
        fields,
    })
}

fn address_overflow(record: &RecordShape, def: &FieldDef) -> ShapeError {
    ShapeError::Unsized {
        shape: record.name.clone(),
        field: def.name.clone(),
        reason: "field end overflows the address space".to_string(),
    }
}

fn field_slot(record: &RecordShape, def: &FieldDef, cache: &LayoutCache) -> Result<SlotKind> {
    match &def.kind {
        FieldKind::Array(element) => {
            let len = def
                .array_length
                .or(def.inferred_length)
                .ok_or_else(|| ShapeError::UnresolvedArrayLength {
                    shape: record.name.clone(),
                    field: def.name.clone(),
                })?;
            let element = scalar_slot(record, def, element, cache)?;
            let stride = element.size();
            if len.checked_mul(stride).is_none() {
                return Err(ShapeError::Unsized {
                    shape: record.name.clone(),
                    field: def.name.clone(),
                    reason: format!("{len} elements of {stride} bytes overflow the address space"),
                });
            }
            Ok(SlotKind::Array {
                element: Box::new(element),
                len,
                stride,
            })
        }
        kind => scalar_slot(record, def, kind, cache),
    }
}

fn scalar_slot(
    record: &RecordShape,
    def: &FieldDef,
    kind: &FieldKind,
    cache: &LayoutCache,
) -> Result<SlotKind> {
    let unsized_field = |reason: &str| ShapeError::Unsized {
        shape: record.name.clone(),
        field: def.name.clone(),
        reason: reason.to_string(),
    };

    if def.storage.is_some() && !matches!(kind, FieldKind::Primitive(_) | FieldKind::Enum(_)) {
        return Err(unsized_field(
            "storage override applies only to primitive and enum values",
        ));
    }

    match kind {
        FieldKind::Primitive(primitive) => {
            Ok(SlotKind::Primitive(def.storage.unwrap_or(*primitive)))
        }
        FieldKind::Enum(enum_def) => {
            let storage = def.storage.unwrap_or(enum_def.backing);
            if !storage.is_integer() {
                return Err(unsized_field(&format!(
                    "enum {} needs an integer storage type, got {storage}",
                    enum_def.name
                )));
            }
            Ok(SlotKind::Enum {
                def: Arc::clone(enum_def),
                storage,
            })
        }
        FieldKind::String => {
            let max_len = def
                .max_length
                .ok_or_else(|| ShapeError::MissingStringLength {
                    shape: record.name.clone(),
                    field: def.name.clone(),
                })?;
            Ok(SlotKind::String { max_len })
        }
        FieldKind::Nested(shape) => match shape.as_ref() {
            Shape::Primitive(primitive) => Ok(SlotKind::Primitive(*primitive)),
            Shape::Record(_) => Ok(SlotKind::Nested(cache.resolve(shape)?)),
        },
        FieldKind::Array(_) => Err(unsized_field("arrays of arrays are not supported")),
    }
}

fn align_up(value: usize, align: usize) -> Option<usize> {
    value.checked_next_multiple_of(align)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_fresh(shape: impl Into<Shape>) -> Result<Arc<LayoutTable>> {
        LayoutCache::new().resolve(&shape.into())
    }

    #[test]
    fn scalar_record_offsets() {
        let shape = RecordShape::new("Scalars")
            .field(FieldDef::primitive("count", 0, Primitive::I32))
            .field(FieldDef::primitive("ratio", 1, Primitive::F32))
            .field(FieldDef::primitive("enabled", 2, Primitive::Bool));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.total_size, 12);
        assert_eq!(layout.offsets(), vec![0, 4, 8]);
    }

    #[test]
    fn nested_record_offset() {
        let child = RecordShape::new("Child").field(FieldDef::primitive("value", 0, Primitive::I32));
        let parent = RecordShape::new("Parent")
            .field(FieldDef::primitive("parentValue", 0, Primitive::I32))
            .field(FieldDef::nested("child", 1, child));

        let layout = resolve_fresh(parent).unwrap();
        assert_eq!(layout.total_size, 8);
        let child = layout.field("child").unwrap();
        assert_eq!(child.offset, 4);
        assert_eq!(child.nested().unwrap().total_size, 4);
    }

    #[test]
    fn array_record_size() {
        let shape = RecordShape::new("Samples")
            .field(FieldDef::primitive("count", 0, Primitive::I32))
            .field(FieldDef::array(
                "values",
                1,
                FieldKind::Primitive(Primitive::F32),
                10,
            ));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.total_size, 44);
        let values = layout.field("values").unwrap();
        assert_eq!(values.offset, 4);
        assert_eq!(values.array_len(), Some(10));
    }

    #[test]
    fn fields_sorted_by_order_not_declaration() {
        let shape = RecordShape::new("Shuffled")
            .field(FieldDef::primitive("second", 1, Primitive::I32))
            .field(FieldDef::primitive("first", 0, Primitive::U8));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.fields[0].name, "first");
        assert_eq!(layout.fields[1].name, "second");
        assert_eq!(layout.offsets(), vec![0, 4]);
        assert_eq!(layout.total_size, 8);
    }

    #[test]
    fn sixty_four_bit_uses_word_alignment() {
        let shape = RecordShape::new("Wide")
            .field(FieldDef::primitive("flag", 0, Primitive::Bool))
            .field(FieldDef::primitive("big", 1, Primitive::F64))
            .field(FieldDef::primitive("counter", 2, Primitive::U64));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.offsets(), vec![0, 4, 12]);
        assert_eq!(layout.total_size, 20);
    }

    #[test]
    fn small_fields_pack_and_pad() {
        let shape = RecordShape::new("Packed")
            .field(FieldDef::primitive("a", 0, Primitive::U8))
            .field(FieldDef::primitive("b", 1, Primitive::I8))
            .field(FieldDef::primitive("c", 2, Primitive::I16))
            .field(FieldDef::primitive("d", 3, Primitive::Bool));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.offsets(), vec![0, 1, 2, 4]);
        assert_eq!(layout.total_size, 8);
    }

    #[test]
    fn string_reserves_full_width() {
        let shape = RecordShape::new("Tagged")
            .field(FieldDef::primitive("flag", 0, Primitive::Bool))
            .field(FieldDef::string("tag", 1, 10))
            .field(FieldDef::primitive("id", 2, Primitive::U16));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.offsets(), vec![0, 4, 14]);
        assert_eq!(layout.field("tag").unwrap().string_max_len(), Some(10));
        assert_eq!(layout.total_size, 16);
    }

    #[test]
    fn primitive_shape_is_leaf() {
        let layout = resolve_fresh(Primitive::I16).unwrap();
        assert!(layout.is_leaf());
        assert!(layout.fields.is_empty());
        assert_eq!(layout.total_size, 2);
    }

    #[test]
    fn storage_override_changes_width() {
        let mode = EnumDef::new("Mode", Primitive::I32).variant("Off", 0);
        let shape = RecordShape::new("Overrides")
            .field(FieldDef::primitive("narrow", 0, Primitive::I32).with_storage(Primitive::I16))
            .field(FieldDef::enumeration("mode", 1, mode).with_storage(Primitive::U8));

        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.fields[0].size, 2);
        assert_eq!(layout.fields[1].offset, 2);
        assert_eq!(layout.fields[1].size, 1);
        assert_eq!(layout.total_size, 4);
    }

    #[test]
    fn array_of_records_uses_record_stride() {
        let point = RecordShape::new("Point")
            .field(FieldDef::primitive("x", 0, Primitive::I16))
            .field(FieldDef::primitive("y", 1, Primitive::I16))
            .field(FieldDef::primitive("visible", 2, Primitive::Bool));
        let shape = RecordShape::new("Path").field(FieldDef::array(
            "points",
            0,
            FieldKind::nested(point),
            3,
        ));

        let layout = resolve_fresh(shape).unwrap();
        match &layout.fields[0].kind {
            SlotKind::Array { stride, len, .. } => {
                assert_eq!(*stride, 8);
                assert_eq!(*len, 3);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(layout.total_size, 24);
    }

    #[test]
    fn inferred_length_used_when_no_explicit_length() {
        let shape = RecordShape::new("Inferred").field(
            FieldDef::new("values", 0, FieldKind::array_of(FieldKind::Primitive(Primitive::U16)))
                .with_inferred_length(5),
        );
        let layout = resolve_fresh(shape).unwrap();
        assert_eq!(layout.fields[0].size, 10);
        assert_eq!(layout.total_size, 12);

        let explicit_wins = RecordShape::new("Explicit").field(
            FieldDef::array("values", 0, FieldKind::Primitive(Primitive::U16), 2)
                .with_inferred_length(5),
        );
        let layout = resolve_fresh(explicit_wins).unwrap();
        assert_eq!(layout.fields[0].size, 4);
    }

    #[test]
    fn rejects_no_ordered_fields() {
        let shape = RecordShape::new("Empty")
            .field(FieldDef::unordered("x", FieldKind::Primitive(Primitive::I32)));
        assert!(matches!(
            resolve_fresh(shape),
            Err(ShapeError::NoOrderedFields { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_order() {
        let shape = RecordShape::new("Dup")
            .field(FieldDef::primitive("a", 3, Primitive::I32))
            .field(FieldDef::primitive("b", 3, Primitive::I32));
        assert!(matches!(
            resolve_fresh(shape),
            Err(ShapeError::DuplicateOrder { order: 3, .. })
        ));
    }

    #[test]
    fn rejects_string_without_max_length() {
        let shape = RecordShape::new("NoLen").field(FieldDef::new("name", 0, FieldKind::String));
        assert!(matches!(
            resolve_fresh(shape),
            Err(ShapeError::MissingStringLength { .. })
        ));
    }

    #[test]
    fn rejects_array_without_length() {
        let shape = RecordShape::new("NoArrayLen").field(FieldDef::new(
            "values",
            0,
            FieldKind::array_of(FieldKind::Primitive(Primitive::I32)),
        ));
        assert!(matches!(
            resolve_fresh(shape),
            Err(ShapeError::UnresolvedArrayLength { .. })
        ));
    }

    #[test]
    fn rejects_unsizable_fields() {
        let jagged = RecordShape::new("Jagged").field(FieldDef::array(
            "grid",
            0,
            FieldKind::array_of(FieldKind::Primitive(Primitive::I32)),
            4,
        ));
        assert!(matches!(
            resolve_fresh(jagged),
            Err(ShapeError::Unsized { .. })
        ));

        let float_enum = RecordShape::new("FloatEnum").field(
            FieldDef::enumeration("mode", 0, EnumDef::new("Mode", Primitive::I32))
                .with_storage(Primitive::F32),
        );
        assert!(matches!(
            resolve_fresh(float_enum),
            Err(ShapeError::Unsized { .. })
        ));

        let string_override = RecordShape::new("StringOverride")
            .field(FieldDef::string("name", 0, 8).with_storage(Primitive::U8));
        assert!(matches!(
            resolve_fresh(string_override),
            Err(ShapeError::Unsized { .. })
        ));
    }

    #[test]
    fn nested_errors_propagate() {
        let broken = RecordShape::new("Broken");
        let parent = RecordShape::new("Parent").field(FieldDef::nested("inner", 0, broken));
        assert!(matches!(
            resolve_fresh(parent),
            Err(ShapeError::NoOrderedFields { shape }) if shape == "Broken"
        ));
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 4), Some(0));
        assert_eq!(align_up(1, 4), Some(4));
        assert_eq!(align_up(4, 4), Some(4));
        assert_eq!(align_up(5, 2), Some(6));
        assert_eq!(align_up(7, 1), Some(7));
        assert_eq!(align_up(usize::MAX, 4), None);
    }

    #[test]
    fn oversized_array_is_unsized() {
        let huge = RecordShape::new("Huge").field(FieldDef::array(
            "v",
            0,
            FieldKind::Primitive(Primitive::U64),
            usize::MAX / 4,
        ));
        assert!(matches!(
            resolve_fresh(huge),
            Err(ShapeError::Unsized { field, .. }) if field == "v"
        ));
    }

    #[test]
    fn record_end_overflow_is_unsized() {
        let wide = RecordShape::new("Wide")
            .field(FieldDef::primitive("head", 0, Primitive::U8))
            .field(FieldDef::array(
                "body",
                1,
                FieldKind::Primitive(Primitive::U8),
                usize::MAX - 2,
            ));
        assert!(matches!(
            resolve_fresh(wide),
            Err(ShapeError::Unsized { field, .. }) if field == "body"
        ));
    }

    #[test]
    fn oversized_registry_array_is_unsized() {
        let mut registry = crate::registry::ShapeRegistry::new();
        registry
            .register_json(&format!(
                r#"{{"records":[{{"name":"Big","fields":[{{"name":"v","order":0,"type":"f64","array_length":{}}}]}}]}}"#,
                usize::MAX / 4
            ))
            .unwrap();
        assert!(matches!(
            registry.layout("Big"),
            Err(ShapeError::Unsized { .. })
        ));
    }
}
