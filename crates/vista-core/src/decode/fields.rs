//! Generic field delegation.
//!
//! The fallback for values no rule matches, and the way decoders expose the
//! payload behind a pointer: every declared field becomes a child. A field
//! whose bytes cannot be read becomes an [`ERROR_MARKER`] child and the rest
//! still render.

use tracing::debug;

use super::{Child, Children, DisplayHint, Session, ERROR_MARKER};
use crate::error::VistaResult;
use crate::types::Value;

/// Children for a value's declared fields, in declaration order.
///
/// Scalars and pointers have no fields and yield nothing.
pub fn delegate_children<'a>(session: Session<'a>, value: Value) -> Children<'a>
{
    let inferior = session.inferior();
    Box::new(value.fields(inferior).into_iter().map(move |(name, field)| match field.probe(inferior) {
        Ok(()) => Child::value(name, field),
        Err(err) => {
            debug!(field = %name, %err, "field unreadable");
            Child::text(name, ERROR_MARKER)
        }
    }))
}

/// Scalar rendering; `None` for records and arrays.
///
/// ## Errors
///
/// - `Inaccessible`: the scalar's bytes cannot be read
pub fn delegate_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    value.format_scalar(session.inferior())
}

/// Summary of `value` through its own decoder, or its scalar rendering.
///
/// ## Errors
///
/// Whatever the selected decoder's summary reports.
pub fn forward_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    match session.select(value) {
        Some(decoder) => decoder.summary(),
        None => delegate_summary(session, value),
    }
}

/// Children of `value` through its own decoder, or its fields.
///
/// ## Errors
///
/// Whatever the selected decoder's children report.
pub fn forward_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    match session.select(value) {
        Some(decoder) => decoder.children(),
        None => Ok(delegate_children(session, value)),
    }
}

pub fn forward_hint(session: Session<'_>, value: Value) -> DisplayHint
{
    session.select(value).map_or(DisplayHint::None, |decoder| decoder.display_hint())
}

/// Fields of the value behind a pointer. A null pointer has no fields.
///
/// ## Errors
///
/// - `NotAPointer`: `pointer` is not a pointer
/// - `Inaccessible`: the pointer itself cannot be read
pub fn pointee_children<'a>(session: Session<'a>, pointer: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    if pointer.is_null(inferior)? {
        return Ok(Box::new(std::iter::empty()));
    }
    Ok(delegate_children(session, pointer.deref(inferior)?))
}
