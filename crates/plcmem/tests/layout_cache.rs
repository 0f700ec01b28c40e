use std::sync::Arc;

use plcmem::{
    clear_layout_cache, layout::LayoutCache, resolve, FieldDef, Primitive, RecordShape, Shape,
};

// Single test: clearing the process-wide cache must not race other resolutions.
#[test]
fn clearing_global_cache_forces_recompute() {
    let shape: Shape = RecordShape::new("Cleared")
        .field(FieldDef::primitive("a", 0, Primitive::I16))
        .field(FieldDef::primitive("b", 1, Primitive::I32))
        .into();

    let first = resolve(&shape).expect("shape should resolve");
    assert_eq!(first.offsets(), vec![0, 4]);
    assert!(LayoutCache::global().get(&shape).is_some());

    clear_layout_cache();
    assert!(LayoutCache::global().is_empty());

    let second = resolve(&shape).expect("shape should resolve after clear");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
}
