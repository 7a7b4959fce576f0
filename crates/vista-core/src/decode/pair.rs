//! Compressed-pair unpacking.
//!
//! A compressed pair stores two elements in carrier records so that an empty
//! element (an allocator, a comparator, a stateless deleter) takes no storage.
//! Each carrier is either a plain member or an empty base; either way the
//! element is the carrier's first declared field.

use crate::error::VistaResult;
use crate::inferior::Inferior;
use crate::types::Value;

/// Split a compressed pair into its two logical elements.
///
/// ## Errors
///
/// - `InvalidLayout`: the record has fewer than two fields, or a carrier has none
pub fn unpack<I: Inferior + ?Sized>(inferior: &I, pair: &Value) -> VistaResult<(Value, Value)>
{
    let pair = if inferior.types().is_pointer(pair.type_id()) { pair.deref(inferior)? } else { *pair };
    let first = pair.field_at(inferior, 0)?.field_at(inferior, 0)?;
    let second = pair.field_at(inferior, 1)?.field_at(inferior, 0)?;
    Ok((first, second))
}
