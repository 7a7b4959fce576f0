//! Pass-through decoders: wrappers that show the value they carry, and small
//! records with a fixed presentation.

use tracing::debug;

use super::fields::{forward_children, forward_summary};
use super::{Child, Children, Session, ERROR_MARKER};
use crate::error::VistaResult;
use crate::types::Value;

/// The guarded value of a kernel `Lock<T, S>`, inside its `UnsafeCell`.
pub fn lock_inner(session: Session<'_>, value: Value) -> VistaResult<Value>
{
    value.path(session.inferior(), "value.value")
}

pub fn lock_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    forward_summary(session, lock_inner(session, value)?)
}

pub fn lock_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    forward_children(session, lock_inner(session, value)?)
}

pub fn unwrap_summary(session: Session<'_>, value: Value, field: &str) -> VistaResult<Option<String>>
{
    forward_summary(session, value.field(session.inferior(), field)?)
}

pub fn unwrap_children<'a>(session: Session<'a>, value: Value, field: &str) -> VistaResult<Children<'a>>
{
    forward_children(session, value.field(session.inferior(), field)?)
}

pub fn pair_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let first = value.field(inferior, "first")?;
    let second = value.field(inferior, "second")?;
    Ok(Box::new([Child::value("first", first), Child::value("second", second)].into_iter()))
}

/// Elements of the recursive `val`/`next` chain, labelled `<0>`, `<1>`, ...
pub fn tuple_children<'a>(session: Session<'a>, value: Value) -> Children<'a>
{
    let inferior = session.inferior();
    let limit = session.limits().max_elements;
    let mut link = Some(value);
    let mut index = 0u64;
    let elements = std::iter::from_fn(move || {
        let current = link.take()?;
        if index >= limit {
            return None;
        }
        let element = current.field(inferior, "val").ok()?;
        link = current.field(inferior, "next").ok();
        let child = Child::value(format!("<{index}>"), element);
        index += 1;
        Some(child)
    });

    let mut elements = elements.peekable();
    if elements.peek().is_none() {
        return Box::new(std::iter::once(Child::text("tuple of size 0", "")));
    }
    Box::new(elements)
}

pub fn function_summary(session: Session<'_>, value: Value) -> String
{
    value.type_name(session.inferior())
}

pub fn reference_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let target = value.field(inferior, "_ptr")?.read_pointer(inferior)?;
    Ok(Some(format!("std::reference_wrapper to {:x}", target.value())))
}

/// `addr`: the referenced address; `reference`: the stored pointer.
pub fn reference_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let pointer = value.field(inferior, "_ptr")?;
    let target = pointer.read_pointer(inferior)?;
    Ok(Box::new(
        [Child::text("addr", target.to_string()), Child::value("reference", pointer)].into_iter(),
    ))
}

pub fn page_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let order = value.field(inferior, "order")?.read_count(inferior)?;
    Ok(Some(format!("Pages of order {order}")))
}

/// `hash` and `name`; a missing or unreadable one is shown as an error marker.
pub fn dentry_children<'a>(session: Session<'a>, value: Value) -> Children<'a>
{
    let inferior = session.inferior();
    Box::new(["hash", "name"].into_iter().map(move |name| {
        match value.field(inferior, name).and_then(|field| field.probe(inferior).map(|()| field)) {
            Ok(field) => Child::value(name, field),
            Err(err) => {
                debug!(field = name, %err, "dentry field unreadable");
                Child::text(name, ERROR_MARKER)
            }
        }
    }))
}
