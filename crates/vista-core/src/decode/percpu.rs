//! Per-CPU thread-local slots.
//!
//! The kernel exposes each per-CPU variable `NAME` through an accessor type
//! `path::_access_NAME`; the storage is the symbol `path::_percpu_inner_NAME`,
//! whose link-time address is an offset from the per-CPU segment base.

use super::fields::forward_summary;
use super::{Child, Children, Session};
use crate::error::{VistaError, VistaResult};
use crate::types::names::replace_in_last_segment;
use crate::types::{Address, Value};

const ACCESSOR_MARKER: &str = "_access_";
const STORAGE_MARKER: &str = "_percpu_inner_";

/// This CPU's copy of the variable behind an accessor value.
///
/// ## Errors
///
/// - `SymbolNotFound`: no storage symbol for the accessor
/// - `RegisterUnavailable`: the segment base register cannot be read
pub fn slot(session: Session<'_>, value: Value) -> VistaResult<Value>
{
    let inferior = session.inferior();
    let accessor = inferior
        .types()
        .structural_name(value.type_id())
        .ok_or_else(|| VistaError::TypeNotFound(value.type_name(inferior)))?;
    let storage = replace_in_last_segment(accessor, ACCESSOR_MARKER, STORAGE_MARKER)
        .ok_or_else(|| VistaError::SymbolNotFound(format!("storage for {accessor}")))?;

    let symbol = inferior.lookup_symbol(&storage)?;
    let base = inferior.read_register(&session.registry().config().tls_base_register)?;
    let address = Address::new(base.wrapping_add(symbol.address().value()));
    Ok(Value::new(address, symbol.type_id()))
}

pub fn summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    forward_summary(session, slot(session, value)?)
}

pub fn children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    Ok(Box::new(std::iter::once(Child::value("[data]", slot(session, value)?))))
}
