//! Circular doubly-linked list and its iterator.
//!
//! ```text
//! std::list<T, A>
//!   m_head   sentinel node { prev, next }, holds no value
//!   m_pair   compressed pair (size, A alloc)
//! std::list<T, A>::node
//!   prev, next, value
//! ```
//!
//! The walk ends when `next` comes back to the sentinel's address. A null or
//! unreadable `next`, or reaching the element limit, also ends it, so a broken
//! chain cannot loop forever.

use tracing::debug;

use super::pair::unpack;
use super::{node_field, read_address, Child, Children, Session};
use crate::error::{VistaError, VistaResult};
use crate::inferior::Inferior;
use crate::types::names::split_scope;
use crate::types::{Address, FieldRef, Value};

pub fn summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let (size, _alloc) = unpack(inferior, &value.field(inferior, "m_pair")?)?;
    Ok(Some(format!("std::list of size {}", size.read_count(inferior)?)))
}

pub fn children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let list_name = structural_name(inferior, value)?;
    let node = inferior.resolve_type(&format!("{list_name}::node"))?;

    let head = value.field(inferior, "m_head")?;
    let next = node_field(inferior, node, "next")?;
    let first = head.field(inferior, "next")?.read_pointer(inferior)?;

    Ok(Box::new(ListWalk {
        inferior,
        sentinel: head.address(),
        next,
        value: node_field(inferior, node, "value")?,
        cursor: first,
        index: 0,
        limit: session.limits().max_elements,
    }))
}

/// `addr`: the node pointer; `value`: the element, when the pointer is set.
pub fn iterator_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let iterator_name = structural_name(inferior, value)?;
    let (list_name, _) = split_scope(&iterator_name)
        .ok_or_else(|| VistaError::InvalidLayout(format!("{iterator_name} is not nested in a list type")))?;
    let node = inferior.resolve_type(&format!("{list_name}::node"))?;

    let pointer = value.field(inferior, "p")?;
    let address = pointer.read_pointer(inferior)?;
    let mut children = vec![Child::value("addr", pointer)];
    if !address.is_null() {
        let element = node_field(inferior, node, "value")?;
        children.push(Child::value("value", Value::new(address + element.offset, element.ty)));
    }
    Ok(Box::new(children.into_iter()))
}

fn structural_name(inferior: &dyn Inferior, value: Value) -> VistaResult<String>
{
    inferior
        .types()
        .structural_name(value.type_id())
        .map(str::to_string)
        .ok_or_else(|| VistaError::TypeNotFound(value.type_name(inferior)))
}

struct ListWalk<'a>
{
    inferior: &'a dyn Inferior,
    sentinel: Address,
    next: FieldRef,
    value: FieldRef,
    cursor: Address,
    index: u64,
    limit: u64,
}

impl ListWalk<'_>
{
    fn stop(&mut self)
    {
        self.cursor = self.sentinel;
    }
}

impl Iterator for ListWalk<'_>
{
    type Item = Child;

    fn next(&mut self) -> Option<Child>
    {
        if self.cursor == self.sentinel {
            return None;
        }
        if self.cursor.is_null() {
            debug!(index = self.index, "list chain ends in null before the sentinel");
            self.stop();
            return None;
        }
        if self.index >= self.limit {
            debug!(limit = self.limit, "list walk reached the element limit");
            self.stop();
            return None;
        }

        let node = self.cursor;
        let child = Child::value(self.index.to_string(), Value::new(node + self.value.offset, self.value.ty));
        self.index += 1;
        match read_address(self.inferior, node + self.next.offset) {
            Ok(next) => self.cursor = next,
            Err(err) => {
                debug!(%err, node = %node, "list node unreadable");
                self.stop();
            }
        }
        Some(child)
    }
}
