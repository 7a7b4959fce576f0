//! # Inferior Trait
//!
//! The interface the engine needs from the host debugger.
//!
//! The engine never touches the inspected process directly. Everything it
//! knows about types, symbols, registers and memory comes through this trait,
//! so the same decoders run against a live debugger, a core file, or the
//! in-process [`SnapshotInferior`] used by the CLI and the tests.
//!
//! ## Why use a trait?
//!
//! - Decoders stay independent of any particular debugger
//! - Tests build exact memory images, including unreadable holes
//! - Every access returns a [`VistaResult`], so faults are explicit values

pub mod file;
pub mod snapshot;

pub use file::SnapshotFile;
pub use snapshot::SnapshotInferior;

use crate::error::{VistaError, VistaResult};
use crate::types::{Address, TypeId, TypeTable, Value};

/// Read-only access to an inspected (halted) program
///
/// Implementors must provide raw memory reads and the type table; symbol and
/// register lookups are needed only by the thread-local decoder. Field
/// projection and dereference have default implementations computed from the
/// type layout, which a host can override when it has a better source (for
/// example an expression evaluator that understands bitfields).
pub trait Inferior
{
    /// Type descriptors known to the inspected program.
    fn types(&self) -> &TypeTable;

    /// Fill `buf` with the bytes at `address`.
    ///
    /// ## Errors
    ///
    /// - `Inaccessible`: any byte of the range is unmapped or unreadable
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> VistaResult<()>;

    /// Find a global symbol by its fully qualified name.
    ///
    /// The returned value's address is the symbol's link-time address. For
    /// per-CPU symbols this is an offset into the per-CPU segment.
    ///
    /// ## Errors
    ///
    /// - `SymbolNotFound`: no symbol with that name
    fn lookup_symbol(&self, name: &str) -> VistaResult<Value>;

    /// Read a register of the stopped thread, such as `gs_base`.
    ///
    /// ## Errors
    ///
    /// - `RegisterUnavailable`: the register is unknown or cannot be read
    fn read_register(&self, name: &str) -> VistaResult<u64>;

    /// Resolve a type by name.
    ///
    /// ## Errors
    ///
    /// - `TypeNotFound`: no type with that name
    fn resolve_type(&self, name: &str) -> VistaResult<TypeId>
    {
        self.types()
            .lookup(name)
            .ok_or_else(|| VistaError::TypeNotFound(name.to_string()))
    }

    /// Project a named field of a struct value, looking through base classes.
    ///
    /// ## Errors
    ///
    /// - `FieldNotFound`: the type has no such field
    fn read_field(&self, value: &Value, name: &str) -> VistaResult<Value>
    {
        let types = self.types();
        let field = types
            .find_field(value.type_id(), name)
            .ok_or_else(|| VistaError::FieldNotFound {
                type_name: types.display_name(value.type_id()),
                field: name.to_string(),
            })?;
        Ok(Value::new(value.address() + field.offset, field.ty))
    }

    /// Follow a pointer or reference.
    ///
    /// ## Errors
    ///
    /// - `NotAPointer`: the value is not a pointer or reference
    /// - `Inaccessible`: the pointer itself cannot be read
    /// - `NullDereference`: the pointer is null
    fn dereference(&self, value: &Value) -> VistaResult<Value>
    {
        let target = self
            .types()
            .target(value.type_id())
            .ok_or_else(|| VistaError::NotAPointer(value.type_name(self)))?;
        let address = value.read_pointer(self)?;
        if address.is_null() {
            return Err(VistaError::NullDereference(value.type_name(self)));
        }
        Ok(Value::new(address, target))
    }
}
