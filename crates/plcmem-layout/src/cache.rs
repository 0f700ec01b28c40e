use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::error::Result;
use crate::layout::{compute, LayoutTable};
use crate::shape::Shape;

static GLOBAL: OnceLock<LayoutCache> = OnceLock::new();

/// Insert-once memo of resolved layouts, keyed by shape.
///
/// Layouts are computed outside the lock. When two callers race on the same
/// shape, both compute the same table and the first insert wins; every caller
/// gets the stored entry.
#[derive(Debug, Default)]
pub struct LayoutCache {
    entries: RwLock<HashMap<Shape, Arc<LayoutTable>>>,
}

impl LayoutCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by [`resolve`].
    pub fn global() -> &'static LayoutCache {
        GLOBAL.get_or_init(LayoutCache::new)
    }

    /// Return the cached layout for `shape`, computing it on first use.
    pub fn resolve(&self, shape: &Shape) -> Result<Arc<LayoutTable>> {
        if let Some(layout) = self.get(shape) {
            return Ok(layout);
        }

        let computed = Arc::new(compute(shape, self)?);

        // Entries are only ever inserted whole, so a poisoned map is still consistent.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let stored = entries
            .entry(shape.clone())
            .or_insert_with(|| {
                debug!(
                    shape = %computed.name,
                    total_size = computed.total_size,
                    fields = computed.fields.len(),
                    "resolved layout"
                );
                Arc::clone(&computed)
            })
            .clone();
        Ok(stored)
    }

    /// Cached layout for `shape`, if already resolved.
    pub fn get(&self, shape: &Shape) -> Option<Arc<LayoutTable>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(shape)
            .cloned()
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached layout.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "cleared layout cache");
    }
}

/// Resolve a shape through the process-wide cache.
pub fn resolve(shape: &Shape) -> Result<Arc<LayoutTable>> {
    LayoutCache::global().resolve(shape)
}

/// Total byte size of a shape.
pub fn get_size(shape: &Shape) -> Result<usize> {
    Ok(resolve(shape)?.total_size)
}

/// Clear the process-wide cache.
pub fn clear_layout_cache() {
    LayoutCache::global().clear();
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::shape::{FieldDef, Primitive, RecordShape};

    fn sample() -> Shape {
        RecordShape::new("Sample")
            .field(FieldDef::primitive("a", 0, Primitive::I32))
            .field(FieldDef::primitive("b", 1, Primitive::U8))
            .into()
    }

    #[test]
    fn repeated_resolve_returns_same_entry() {
        let cache = LayoutCache::new();
        let first = cache.resolve(&sample()).unwrap();
        let second = cache.resolve(&sample()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn nested_shapes_are_cached_too() {
        let cache = LayoutCache::new();
        let inner = sample();
        let outer: Shape = RecordShape::new("Outer")
            .field(FieldDef::nested("inner", 0, inner.clone()))
            .into();

        let outer_layout = cache.resolve(&outer).unwrap();
        let inner_layout = cache.get(&inner).unwrap();
        assert!(Arc::ptr_eq(
            outer_layout.fields[0].nested().unwrap(),
            &inner_layout
        ));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_forces_recompute() {
        let cache = LayoutCache::new();
        let first = cache.resolve(&sample()).unwrap();
        cache.clear();
        assert!(cache.is_empty());

        let second = cache.resolve(&sample()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[test]
    fn failed_resolution_is_not_cached() {
        let cache = LayoutCache::new();
        let empty: Shape = RecordShape::new("Empty").into();
        assert!(cache.resolve(&empty).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_first_resolution_agrees() {
        let cache = Arc::new(LayoutCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.resolve(&sample()).unwrap())
            })
            .collect();

        let layouts: Vec<Arc<LayoutTable>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = cache.get(&sample()).unwrap();
        for layout in &layouts {
            assert!(Arc::ptr_eq(layout, &stored));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn global_get_size() {
        assert_eq!(get_size(&sample()).unwrap(), 8);
        assert_eq!(get_size(&Primitive::F64.into()).unwrap(), 8);
    }
}
