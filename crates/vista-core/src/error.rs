//! # Error Types
//!
//! General error handling for the inspection engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::Address;

/// Main error type for inspection operations
///
/// Every read the engine performs goes through an [`Inferior`](crate::Inferior)
/// and can fail. Decoders contain most of these failures to the child that
/// produced them; the ones that escape a decoder are reported for that one
/// value only.
///
/// ## Error Categories
///
/// 1. **Resolution errors**: TypeNotFound, SymbolNotFound, RegisterUnavailable
/// 2. **Layout errors**: FieldNotFound, NotAPointer, InvalidLayout
/// 3. **Memory errors**: Inaccessible, NullDereference
/// 4. **Setup errors**: InvalidPattern, Snapshot, Io, Json
#[derive(Error, Debug)]
pub enum VistaError
{
    /// The debugger could not resolve a type by name
    ///
    /// Raised by decoders that need a companion type the value's own type does
    /// not reference directly (e.g. the value node of a linked list).
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// A struct does not declare the requested field
    ///
    /// This almost always means the inspected binary was built from a
    /// different layout revision than the decoder expects.
    #[error("Type {type_name} has no field `{field}`")]
    FieldNotFound
    {
        /// Display name of the type that was projected
        type_name: String,
        /// The field that was requested
        field: String,
    },

    /// Memory at the given range cannot be read
    ///
    /// This happens when:
    /// - The address is not mapped in the inspected process
    /// - A pointer is stale or dangling
    /// - The range straddles the end of a mapped region
    #[error("Memory inaccessible: {len} bytes at {address}")]
    Inaccessible
    {
        /// Start of the failed read
        address: Address,
        /// Number of bytes requested
        len: u64,
    },

    /// Attempted to dereference a null pointer
    #[error("Null pointer dereference of {0}")]
    NullDereference(String),

    /// A pointer operation was applied to a value that is not a pointer
    #[error("Not a pointer: {0}")]
    NotAPointer(String),

    /// A symbol could not be found in the inspected program
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The debugger does not expose the requested register
    #[error("Register unavailable: {0}")]
    RegisterUnavailable(String),

    /// A value's layout does not match what a decoder requires
    ///
    /// Examples:
    /// - A compressed pair with fewer than two members
    /// - A scalar read with an unsupported width
    /// - A struct-only operation applied to a scalar
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// A dispatch rule pattern failed to compile
    #[error("Invalid dispatch pattern `{pattern}`: {source}")]
    InvalidPattern
    {
        /// The offending pattern text
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A snapshot description is malformed
    ///
    /// The string names the offending entry (type, region or symbol).
    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    /// I/O error (reading snapshot files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error for snapshot files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VistaError
{
    /// Whether this error came from unreadable memory rather than a layout or
    /// resolution problem.
    #[must_use]
    pub fn is_memory_fault(&self) -> bool
    {
        matches!(self, VistaError::Inaccessible { .. } | VistaError::NullDereference(_))
    }
}

/// Convenience type alias for `Result<T, VistaError>`
///
/// ```rust
/// use vista_core::error::VistaResult;
/// fn foo() -> VistaResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type VistaResult<T> = std::result::Result<T, VistaError>;
