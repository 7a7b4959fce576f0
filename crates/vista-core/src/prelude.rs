//! Common module for library exports

pub use crate::config::Limits;
pub use crate::decode::{Child, ChildValue, Children, Decoder, DisplayHint, Session};
pub use crate::error::{VistaError, VistaResult};
pub use crate::inferior::{Inferior, SnapshotFile, SnapshotInferior};
pub use crate::registry::{DecoderKind, Registry, RegistryConfig, TreeFlavor};
pub use crate::render::{render, render_symbol, ValueTree};
pub use crate::types::{Address, ScalarKind, StructBuilder, TypeId, TypeTable, Value};
