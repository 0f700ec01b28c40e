//! Controller memory layout resolution.
//!
//! Turns a statically declared record shape into an immutable table of
//! field offsets and sizes matching the controller's native representation:
//! - Fields are laid out in declaration-order index sequence
//! - Alignment never exceeds the 4-byte controller word (64-bit values included)
//! - Record sizes are padded to a multiple of 4 bytes
//!
//! Resolved layouts are memoized in a process-wide cache.

pub mod cache;
pub mod error;
pub mod layout;
pub mod registry;
pub mod shape;

pub use cache::{clear_layout_cache, get_size, resolve, LayoutCache};
pub use error::{Result, ShapeError};
pub use layout::{FieldLayout, LayoutTable, SlotKind, WORD_ALIGN};
pub use registry::ShapeRegistry;
pub use shape::{EnumDef, FieldDef, FieldKind, Primitive, RecordShape, Shape};
