//! Dynamic array and its iterator.
//!
//! ```text
//! std::vector<T, A>
//!   m_data      compressed pair (T* data, A alloc)
//!   m_size      element count
//!   m_capacity  allocated element slots
//! ```

use tracing::debug;

use super::pair::unpack;
use super::{Child, Children, Session};
use crate::error::{VistaError, VistaResult};
use crate::types::Value;

pub fn summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let size = value.field(inferior, "m_size")?.read_count(inferior)?;
    let capacity = value.field(inferior, "m_capacity")?.read_count(inferior)?;
    Ok(Some(format!("std::vector of size {size}, capacity {capacity}")))
}

/// Elements `data[0] .. data[size - 1]`, labelled by index.
pub fn children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let types = inferior.types();
    let (data, _alloc) = unpack(inferior, &value.field(inferior, "m_data")?)?;
    let mut size = value.field(inferior, "m_size")?.read_count(inferior)?;
    if size > session.limits().max_elements {
        debug!(size, limit = session.limits().max_elements, "vector truncated to element limit");
        size = session.limits().max_elements;
    }

    let element = types
        .target(data.type_id())
        .ok_or_else(|| VistaError::NotAPointer(data.type_name(inferior)))?;
    let stride = types.get(element).size;
    let base = data.read_pointer(inferior)?;
    if base.is_null() && size > 0 {
        debug!(size, "vector with elements but no buffer");
        return Ok(Box::new(std::iter::empty()));
    }

    Ok(Box::new(
        (0..size).map(move |index| Child::value(index.to_string(), Value::new(base.element(index, stride), element))),
    ))
}

/// `value`: the element the iterator points at.
pub fn iterator_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let target = value.field(inferior, "m_ptr")?.deref(inferior)?;
    Ok(Box::new(std::iter::once(Child::value("value", target))))
}
