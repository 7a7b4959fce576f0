//! # Ordered map and set
//!
//! Both containers wrap one red-black tree:
//!
//! ```text
//! std::map<K, V, C, A> / std::set<T, C, A>
//!   tree
//!     root_data   compressed pair (node* root, A alloc)
//!     size_data   compressed pair (size, C comp)
//! node
//!   left, right, parent, value
//! ```
//!
//! ## Traversal
//!
//! In-order, driven by parent pointers: no recursion and no stack, so the
//! walk reads a bounded number of nodes per step and can stop at any point.
//!
//! - `leftmost(n)`: follow `left` until it is null
//! - `successor(n)`: `leftmost(n.right)` if there is a right child; otherwise
//!   climb until reaching a node that is its parent's left child and return
//!   that parent, or run out of parents (no successor)
//!
//! The walk yields `size` values. A tree that runs out of successors early,
//! or a node that cannot be read, ends the sequence instead of failing it.

use tracing::debug;

use super::pair::unpack;
use super::{node_field, read_address, Child, Children, Session};
use crate::error::{VistaError, VistaResult};
use crate::inferior::Inferior;
use crate::registry::TreeFlavor;
use crate::types::{Address, FieldRef, TypeId, Value};

/// Longest left spine or parent chain followed in one step. A balanced tree
/// addressing all of memory is shallower than this.
pub const MAX_TREE_HEIGHT: usize = 128;

pub fn summary(session: Session<'_>, value: Value, flavor: TreeFlavor) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let size = tree_size(inferior, value)?;
    Ok(Some(format!("{} of size {size}", flavor.container_name())))
}

pub fn children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let tree = value.field(inferior, "tree")?;
    let (root, _alloc) = unpack(inferior, &tree.field(inferior, "root_data")?)?;
    let size = tree_size(inferior, value)?;

    let root_address = root.read_pointer(inferior)?;
    if root_address.is_null() {
        if size != 0 {
            debug!(size, "empty tree with a nonzero size");
        }
        return Ok(Box::new(std::iter::empty()));
    }

    let node = inferior
        .types()
        .target(root.type_id())
        .ok_or_else(|| VistaError::NotAPointer(root.type_name(inferior)))?;
    let links = Links::resolve(inferior, node)?;
    let first = links.leftmost(inferior, root_address)?;

    Ok(Box::new(TreeWalk {
        inferior,
        links,
        cursor: Some(first),
        index: 0,
        size: size.min(session.limits().max_elements),
    }))
}

/// `addr`: the node pointer; `value`: the element, when the pointer is set.
pub fn iterator_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let pointer = value.field(inferior, "p")?;
    let mut children = vec![Child::value("addr", pointer)];
    if !pointer.is_null(inferior)? {
        children.push(Child::value("value", pointer.field(inferior, "value")?));
    }
    Ok(Box::new(children.into_iter()))
}

fn tree_size(inferior: &dyn Inferior, value: Value) -> VistaResult<u64>
{
    let tree = value.field(inferior, "tree")?;
    let (size, _comp) = unpack(inferior, &tree.field(inferior, "size_data")?)?;
    size.read_count(inferior)
}

/// Field offsets of one node type.
#[derive(Debug, Clone, Copy)]
struct Links
{
    left: u64,
    right: u64,
    parent: u64,
    value: FieldRef,
}

impl Links
{
    fn resolve(inferior: &dyn Inferior, node: TypeId) -> VistaResult<Self>
    {
        Ok(Self {
            left: node_field(inferior, node, "left")?.offset,
            right: node_field(inferior, node, "right")?.offset,
            parent: node_field(inferior, node, "parent")?.offset,
            value: node_field(inferior, node, "value")?,
        })
    }

    fn leftmost(&self, inferior: &dyn Inferior, mut node: Address) -> VistaResult<Address>
    {
        for _ in 0..MAX_TREE_HEIGHT {
            let left = read_address(inferior, node + self.left)?;
            if left.is_null() {
                return Ok(node);
            }
            node = left;
        }
        Err(VistaError::InvalidLayout(format!("left spine from {node} exceeds {MAX_TREE_HEIGHT} nodes")))
    }

    fn successor(&self, inferior: &dyn Inferior, node: Address) -> VistaResult<Option<Address>>
    {
        let right = read_address(inferior, node + self.right)?;
        if !right.is_null() {
            return self.leftmost(inferior, right).map(Some);
        }

        let mut current = node;
        for _ in 0..MAX_TREE_HEIGHT {
            let parent = read_address(inferior, current + self.parent)?;
            if parent.is_null() {
                return Ok(None);
            }
            if read_address(inferior, parent + self.left)? == current {
                return Ok(Some(parent));
            }
            current = parent;
        }
        Err(VistaError::InvalidLayout(format!("parent chain from {node} exceeds {MAX_TREE_HEIGHT} nodes")))
    }
}

struct TreeWalk<'a>
{
    inferior: &'a dyn Inferior,
    links: Links,
    cursor: Option<Address>,
    index: u64,
    size: u64,
}

impl Iterator for TreeWalk<'_>
{
    type Item = Child;

    fn next(&mut self) -> Option<Child>
    {
        if self.index >= self.size {
            return None;
        }
        let node = self.cursor.take()?;
        let value = self.links.value;
        let child = Child::value(self.index.to_string(), Value::new(node + value.offset, value.ty));
        self.index += 1;

        if self.index < self.size {
            match self.links.successor(self.inferior, node) {
                Ok(Some(next)) => self.cursor = Some(next),
                Ok(None) => debug!(yielded = self.index, size = self.size, "tree ran out of nodes before its size"),
                Err(err) => debug!(%err, node = %node, "tree walk stopped"),
            }
        }
        Some(child)
    }
}
