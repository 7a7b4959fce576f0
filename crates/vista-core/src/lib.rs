//! # vista-core
//!
//! Value-introspection engine for Vista.
//!
//! This crate decodes the in-memory representation of a kernel runtime's
//! containers and smart pointers into structured trees, without running code
//! in the inspected program and without writing to it:
//!
//! - Dynamic arrays, small-buffer strings, linked lists and red-black trees
//! - Unique, shared, `NonNull` and `Arc` pointers
//! - Per-CPU thread-local slots, locks and transparent cells
//!
//! ## Layers
//!
//! - [`inferior`]: the [`Inferior`] trait the host debugger implements, plus an
//!   in-process [`SnapshotInferior`] for the CLI and tests
//! - [`types`]: type layouts and typed memory views
//! - [`registry`]: type-name patterns mapped to decoder kinds
//! - [`decode`]: the decoders and the rendering protocol
//! - [`render`]: expands a value into a [`ValueTree`]
//!
//! ## Example
//!
//! ```rust
//! use vista_core::prelude::*;
//!
//! let mut types = TypeTable::new();
//! let u32_t = types.scalar("u32", ScalarKind::Unsigned, 4);
//! let mut snapshot = SnapshotInferior::new(types);
//! let at = snapshot.alloc(4);
//! snapshot.write_u32(at, 42).unwrap();
//! snapshot.define_symbol("answer", Value::new(at, u32_t));
//!
//! let registry = Registry::new();
//! let limits = Limits::default();
//! let session = Session::new(&snapshot, &registry, &limits);
//! let tree = render_symbol(session, "answer").unwrap();
//! assert_eq!(tree.summary.as_deref(), Some("42"));
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod inferior;
pub mod prelude;
pub mod registry;
pub mod render;
pub mod types;

// Re-export commonly used types
pub use config::Limits;
pub use decode::{Child, ChildValue, Children, Decoder, DisplayHint, Session};
pub use error::{VistaError, VistaResult};
pub use inferior::{Inferior, SnapshotFile, SnapshotInferior};
pub use registry::{DecoderKind, Registry, RegistryBuilder, RegistryConfig, TreeFlavor};
pub use render::{render, render_symbol, ValueTree};
pub use types::{Address, TypeId, TypeTable, Value};
