use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::cache::resolve;
use crate::error::{Result, ShapeError};
use crate::layout::LayoutTable;
use crate::shape::{EnumDef, FieldDef, FieldKind, Primitive, RecordShape, Shape};

/// Name-keyed table of record shapes and enums, built once at startup.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    records: HashMap<String, Arc<Shape>>,
    enums: HashMap<String, Arc<EnumDef>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionDocument {
    #[serde(default)]
    enums: Vec<EnumDefinition>,
    #[serde(default)]
    records: Vec<RecordDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumDefinition {
    name: String,
    backing: Primitive,
    variants: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordDefinition {
    name: String,
    fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDefinition {
    name: String,
    #[serde(default)]
    order: Option<u32>,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    storage: Option<Primitive>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    array_length: Option<usize>,
    #[serde(default)]
    array: bool,
}

impl ShapeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record shape under its name.
    pub fn register(&mut self, record: RecordShape) -> Result<Arc<Shape>> {
        self.ensure_free(&record.name)?;
        let name = record.name.clone();
        let shape = Arc::new(Shape::Record(record));
        self.records.insert(name.clone(), Arc::clone(&shape));
        debug!(shape = %name, "registered record shape");
        Ok(shape)
    }

    /// Register an enum under its name.
    pub fn register_enum(&mut self, def: EnumDef) -> Result<Arc<EnumDef>> {
        self.ensure_free(&def.name)?;
        let def = Arc::new(def);
        self.enums.insert(def.name.clone(), Arc::clone(&def));
        debug!(enum_name = %def.name, "registered enum");
        Ok(def)
    }

    /// Register every enum and record of a JSON definition document.
    ///
    /// Enums are registered first, then records in document order. A record
    /// may only reference records registered before it.
    pub fn register_json(&mut self, definitions: &str) -> Result<()> {
        let document: DefinitionDocument = serde_json::from_str(definitions)?;

        for definition in document.enums {
            let mut variants: Vec<(String, i64)> = definition.variants.into_iter().collect();
            variants.sort_by_key(|(_, value)| *value);
            self.register_enum(EnumDef {
                name: definition.name,
                backing: definition.backing,
                variants,
            })?;
        }

        for definition in document.records {
            let record = self.build_record(definition)?;
            self.register(record)?;
        }

        Ok(())
    }

    /// Load from embedded definition documents.
    pub fn from_embedded(documents: &[&str]) -> Result<Self> {
        let mut registry = Self::new();
        for document in documents {
            registry.register_json(document)?;
        }
        Ok(registry)
    }

    /// Registered record shape by name.
    pub fn shape(&self, name: &str) -> Option<Arc<Shape>> {
        self.records.get(name).cloned()
    }

    /// Registered enum by name.
    pub fn enum_def(&self, name: &str) -> Option<Arc<EnumDef>> {
        self.enums.get(name).cloned()
    }

    /// Names of registered record shapes, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Resolve a registered shape through the process-wide cache.
    pub fn layout(&self, name: &str) -> Result<Arc<LayoutTable>> {
        let shape = self.shape(name).ok_or_else(|| ShapeError::UnknownType {
            type_name: name.to_string(),
            context: "registry lookup".to_string(),
        })?;
        resolve(&shape)
    }

    /// Resolve every registered shape, surfacing the first definition error.
    pub fn resolve_all(&self) -> Result<()> {
        for name in self.names() {
            self.layout(&name)?;
        }
        Ok(())
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.records.contains_key(name)
            || self.enums.contains_key(name)
            || Primitive::from_name(name).is_some()
            || name == "string"
        {
            return Err(ShapeError::AlreadyRegistered(name.to_string()));
        }
        Ok(())
    }

    fn build_record(&self, definition: RecordDefinition) -> Result<RecordShape> {
        let mut record = RecordShape::new(definition.name);
        for field in definition.fields {
            let element = self.lookup_kind(&field.type_name, &record.name, &field.name)?;
            let is_array = field.array || field.array_length.is_some();
            let kind = if is_array {
                FieldKind::array_of(element)
            } else {
                element
            };

            record.fields.push(FieldDef {
                name: field.name,
                order: field.order,
                kind,
                storage: field.storage,
                max_length: field.max_length,
                array_length: field.array_length,
                inferred_length: None,
            });
        }
        Ok(record)
    }

    fn lookup_kind(&self, type_name: &str, record: &str, field: &str) -> Result<FieldKind> {
        if let Some(primitive) = Primitive::from_name(type_name) {
            return Ok(FieldKind::Primitive(primitive));
        }
        if type_name == "string" {
            return Ok(FieldKind::String);
        }
        if let Some(def) = self.enums.get(type_name) {
            return Ok(FieldKind::Enum(Arc::clone(def)));
        }
        if let Some(shape) = self.records.get(type_name) {
            return Ok(FieldKind::Nested(Arc::clone(shape)));
        }
        Err(ShapeError::UnknownType {
            type_name: type_name.to_string(),
            context: format!("{record}.{field}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SlotKind;

    const MOTOR_DEFINITIONS: &str = r#"{
        "enums": [
            { "name": "DriveMode", "backing": "u8", "variants": { "Stopped": 0, "Running": 1, "Fault": 9 } }
        ],
        "records": [
            { "name": "Limits", "fields": [
                { "name": "min", "order": 0, "type": "f32" },
                { "name": "max", "order": 1, "type": "f32" }
            ]},
            { "name": "Motor", "fields": [
                { "name": "speed", "order": 0, "type": "f32" },
                { "name": "mode", "order": 1, "type": "DriveMode", "storage": "u16" },
                { "name": "tag", "order": 2, "type": "string", "max_length": 20 },
                { "name": "temps", "order": 3, "type": "f32", "array_length": 4 },
                { "name": "limits", "order": 4, "type": "Limits" },
                { "name": "cache", "type": "u64" }
            ]}
        ]
    }"#;

    #[test]
    fn json_definitions_register_and_resolve() {
        let registry = ShapeRegistry::from_embedded(&[MOTOR_DEFINITIONS]).unwrap();
        assert_eq!(registry.names(), vec!["Limits", "Motor"]);

        let layout = registry.layout("Motor").unwrap();
        assert_eq!(layout.fields.len(), 5);
        assert_eq!(layout.offsets(), vec![0, 4, 8, 28, 44]);
        assert_eq!(layout.total_size, 52);

        match &layout.field("mode").unwrap().kind {
            SlotKind::Enum { def, storage } => {
                assert_eq!(*storage, Primitive::U16);
                assert_eq!(def.value_of("Fault"), Some(9));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        registry.resolve_all().unwrap();
    }

    #[test]
    fn enum_variants_sorted_by_discriminant() {
        let registry = ShapeRegistry::from_embedded(&[MOTOR_DEFINITIONS]).unwrap();
        let mode = registry.enum_def("DriveMode").unwrap();
        let names: Vec<&str> = mode.variants.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Stopped", "Running", "Fault"]);
    }

    #[test]
    fn unknown_type_fails() {
        let mut registry = ShapeRegistry::new();
        let result = registry.register_json(
            r#"{"records":[{"name":"R","fields":[{"name":"x","order":0,"type":"Missing"}]}]}"#,
        );
        assert!(matches!(result, Err(ShapeError::UnknownType { .. })));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ShapeRegistry::new();
        registry
            .register(RecordShape::new("Twice").field(FieldDef::primitive("a", 0, Primitive::I32)))
            .unwrap();
        assert!(matches!(
            registry.register(RecordShape::new("Twice")),
            Err(ShapeError::AlreadyRegistered(_))
        ));
        assert!(matches!(
            registry.register_enum(EnumDef::new("i32", Primitive::I32)),
            Err(ShapeError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn malformed_json_fails() {
        let mut registry = ShapeRegistry::new();
        assert!(matches!(
            registry.register_json("not-json"),
            Err(ShapeError::InvalidDefinition(_))
        ));
        assert!(matches!(
            registry.register_json(r#"{"records":[{"name":"R","fields":[],"extra":1}]}"#),
            Err(ShapeError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn array_flag_without_length_fails_at_resolve() {
        let registry = ShapeRegistry::from_embedded(&[
            r#"{"records":[{"name":"Open","fields":[{"name":"v","order":0,"type":"i16","array":true}]}]}"#,
        ])
        .unwrap();
        assert!(matches!(
            registry.layout("Open"),
            Err(ShapeError::UnresolvedArrayLength { .. })
        ));
        assert!(registry.resolve_all().is_err());
    }

    #[test]
    fn unknown_shape_lookup_fails() {
        let registry = ShapeRegistry::new();
        assert!(matches!(
            registry.layout("Nope"),
            Err(ShapeError::UnknownType { .. })
        ));
    }
}
