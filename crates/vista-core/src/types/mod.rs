//! # Types
//!
//! The memory-view primitives every decoder is written against: addresses,
//! type descriptors and typed values.

pub mod address;
pub mod layout;
pub mod names;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use layout::{
    Field, FieldRef, Fields, Qualifier, ScalarKind, StructBuilder, TypeDesc, TypeId, TypeKind, TypeTable, POINTER_SIZE,
};
pub use value::{read_c_string_at, read_text_at, Value};
