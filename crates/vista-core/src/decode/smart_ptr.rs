//! Owning and shared pointers.
//!
//! ```text
//! std::unique_ptr<T, D>
//!   data   compressed pair (T* pointer, D deleter)
//! std::shared_ptr<T>
//!   ptr    T*
//!   cb     control block* { ref_count, weak_count, ptr }
//! ```

use super::fields::{delegate_children, pointee_children};
use super::pair::unpack;
use super::{Child, Children, Session};
use crate::error::VistaResult;
use crate::inferior::Inferior;
use crate::types::Value;

fn type_label(inferior: &dyn Inferior, value: Value) -> String
{
    inferior
        .types()
        .structural_name(value.type_id())
        .map_or_else(|| value.type_name(inferior), str::to_string)
}

pub fn unique_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let (pointer, _deleter) = unpack(inferior, &value.field(inferior, "data")?)?;
    let address = pointer.read_pointer(inferior)?;
    let label = type_label(inferior, value);
    if address.is_null() {
        return Ok(Some(format!("nullptr of {label}")));
    }
    Ok(Some(format!("{label} to {address}")))
}

/// `[deleter]`, then the pointee's fields when the pointer is set.
pub fn unique_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let (pointer, deleter) = unpack(inferior, &value.field(inferior, "data")?)?;
    let deleter = std::iter::once(Child::value("[deleter]", deleter));
    Ok(Box::new(deleter.chain(pointee_children(session, pointer)?)))
}

pub fn shared_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let label = type_label(inferior, value);
    let pointer = value.field(inferior, "ptr")?.read_pointer(inferior)?;
    if pointer.is_null() {
        return Ok(Some(format!("nullptr of {label}")));
    }

    let cb = value.field(inferior, "cb")?;
    let cb_address = cb.read_pointer(inferior)?;
    let strong = cb.field(inferior, "ref_count")?.read_count(inferior)?;
    let weak = cb.field(inferior, "weak_count")?.read_count(inferior)?;
    let managed = cb.field(inferior, "ptr")?.read_pointer(inferior)?;
    Ok(Some(format!(
        "{label} to {pointer}, ref({strong}), wref({weak}), cb({cb_address}), memp({managed})"
    )))
}

/// The pointee's fields; nothing for a null pointer.
pub fn shared_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let pointer = value.field(inferior, "ptr")?;
    if pointer.is_null(inferior)? {
        return Ok(Box::new(std::iter::empty()));
    }
    Ok(delegate_children(session, pointer.deref(inferior)?))
}
