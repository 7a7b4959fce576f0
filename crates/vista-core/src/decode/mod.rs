//! # Decoders
//!
//! Layout-aware decoders that turn raw memory into a summary line and a lazy
//! sequence of labelled children.
//!
//! ## Rendering protocol
//!
//! Every [`Decoder`] answers three questions about one value:
//!
//! - [`Decoder::summary`]: a one-line description, if the layout has one
//! - [`Decoder::display_hint`]: whether children form a sequence or the value is text
//! - [`Decoder::children`]: a finite, restartable iterator of [`Child`] entries
//!
//! Decoders never own what they read. Child values are views that the
//! presentation layer hands back to [`Session::select`], so nested containers
//! compose without any decoder knowing about the others.
//!
//! ## Faults
//!
//! A fault while building a decoder's own summary or child iterator is returned
//! as an error for that value only. Faults on individual children are reported
//! inline as text markers ([`ERROR_MARKER`], [`INACCESSIBLE_MARKER`]) so the
//! rest of the structure still renders.

pub mod arc;
pub mod fields;
pub mod list;
pub mod pair;
pub mod percpu;
pub mod rbtree;
pub mod smart_ptr;
pub mod string;
pub mod vector;
pub mod wrappers;

use std::fmt;

use serde::Serialize;

use crate::config::Limits;
use crate::error::{VistaError, VistaResult};
use crate::inferior::Inferior;
use crate::registry::{DecoderKind, Registry};
use crate::types::{Address, FieldRef, TypeId, Value, POINTER_SIZE};

/// Shown in place of a field whose bytes cannot be read.
pub const ERROR_MARKER: &str = "<Error>";

/// Shown in place of a slice element that cannot be read; ends the slice.
pub const INACCESSIBLE_MARKER: &str = "[inaccessible]";

/// Lazy child sequence.
pub type Children<'a> = Box<dyn Iterator<Item = Child> + 'a>;

/// How the presentation layer should lay out a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayHint
{
    /// Children are elements, labelled by index.
    Sequence,
    /// The summary is the value's text; there are no children.
    Text,
    None,
}

impl fmt::Display for DisplayHint
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            DisplayHint::Sequence => f.write_str("sequence"),
            DisplayHint::Text => f.write_str("text"),
            DisplayHint::None => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildValue
{
    /// A view to render recursively.
    Value(Value),
    /// Literal text such as a fault marker or an address.
    Text(String),
}

/// One labelled entry of a decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child
{
    pub label: String,
    pub value: ChildValue,
}

impl Child
{
    pub fn value(label: impl Into<String>, value: Value) -> Self
    {
        Self {
            label: label.into(),
            value: ChildValue::Value(value),
        }
    }

    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self
    {
        Self {
            label: label.into(),
            value: ChildValue::Text(text.into()),
        }
    }

    /// The view, if this child is not a text marker.
    #[must_use]
    pub fn as_value(&self) -> Option<Value>
    {
        match self.value {
            ChildValue::Value(value) => Some(value),
            ChildValue::Text(_) => None,
        }
    }
}

/// Everything a decode needs: the inspected program, the dispatch rules and
/// the limits. Cheap to copy; decoders and child iterators hold one.
#[derive(Clone, Copy)]
pub struct Session<'a>
{
    inferior: &'a dyn Inferior,
    registry: &'a Registry,
    limits: &'a Limits,
}

impl fmt::Debug for Session<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Session")
            .field("rules", &self.registry.rules().count())
            .field("limits", self.limits)
            .finish_non_exhaustive()
    }
}

impl<'a> Session<'a>
{
    pub fn new(inferior: &'a dyn Inferior, registry: &'a Registry, limits: &'a Limits) -> Self
    {
        Self {
            inferior,
            registry,
            limits,
        }
    }

    #[must_use]
    pub fn inferior(&self) -> &'a dyn Inferior
    {
        self.inferior
    }

    #[must_use]
    pub fn registry(&self) -> &'a Registry
    {
        self.registry
    }

    #[must_use]
    pub fn limits(&self) -> &'a Limits
    {
        self.limits
    }

    /// The decoder for `value`, or `None` when no rule matches its type.
    #[must_use]
    pub fn select(&self, value: Value) -> Option<Decoder<'a>>
    {
        self.registry.select(*self, value)
    }

    /// Build a decoder of a given kind without consulting the rules.
    #[must_use]
    pub fn decoder(&self, value: Value, kind: DecoderKind) -> Decoder<'a>
    {
        Decoder {
            session: *self,
            value,
            kind,
        }
    }
}

/// Read a raw pointer stored at `address`.
pub(crate) fn read_address(inferior: &dyn Inferior, address: Address) -> VistaResult<Address>
{
    let mut buf = [0u8; POINTER_SIZE as usize];
    inferior.read_memory(address, &mut buf)?;
    Ok(Address::new(u64::from_le_bytes(buf)))
}

/// Locate `field` in a node type, looking through bases.
pub(crate) fn node_field(inferior: &dyn Inferior, node: TypeId, field: &str) -> VistaResult<FieldRef>
{
    let types = inferior.types();
    types.find_field(node, field).ok_or_else(|| VistaError::FieldNotFound {
        type_name: types.display_name(node),
        field: field.to_string(),
    })
}

/// A value paired with the decoder selected for it.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a>
{
    session: Session<'a>,
    value: Value,
    kind: DecoderKind,
}

impl<'a> Decoder<'a>
{
    #[must_use]
    pub const fn kind(&self) -> DecoderKind
    {
        self.kind
    }

    #[must_use]
    pub const fn value(&self) -> Value
    {
        self.value
    }

    /// One-line description of the value.
    ///
    /// ## Errors
    ///
    /// Any fault reading the fields the summary is computed from.
    pub fn summary(&self) -> VistaResult<Option<String>>
    {
        let (session, value) = (self.session, self.value);
        match self.kind {
            DecoderKind::Vector => vector::summary(session, value),
            DecoderKind::VectorIterator => Ok(None),
            DecoderKind::String => string::summary(session, value),
            DecoderKind::StringView => string::view_summary(session, value),
            DecoderKind::List => list::summary(session, value),
            DecoderKind::ListIterator => Ok(None),
            DecoderKind::Tree(flavor) => rbtree::summary(session, value, flavor),
            DecoderKind::TreeIterator => Ok(None),
            DecoderKind::UniquePtr => smart_ptr::unique_summary(session, value),
            DecoderKind::SharedPtr => smart_ptr::shared_summary(session, value),
            DecoderKind::NonNull => arc::non_null_summary(session, value),
            DecoderKind::Arc => arc::summary(session, value),
            DecoderKind::ThreadLocal => percpu::summary(session, value),
            DecoderKind::Lock => wrappers::lock_summary(session, value),
            DecoderKind::Unwrap(field) => wrappers::unwrap_summary(session, value, field),
            DecoderKind::Pair | DecoderKind::Tuple => Ok(None),
            DecoderKind::Function => Ok(Some(wrappers::function_summary(session, value))),
            DecoderKind::ReferenceWrapper => wrappers::reference_summary(session, value),
            DecoderKind::Page => wrappers::page_summary(session, value),
            DecoderKind::Dentry => Ok(Some("Dentry".to_string())),
        }
    }

    #[must_use]
    pub fn display_hint(&self) -> DisplayHint
    {
        match self.kind {
            DecoderKind::Vector | DecoderKind::List | DecoderKind::Tree(_) => DisplayHint::Sequence,
            DecoderKind::String | DecoderKind::StringView | DecoderKind::Page => DisplayHint::Text,
            DecoderKind::Lock => wrappers::lock_inner(self.session, self.value)
                .map_or(DisplayHint::None, |inner| fields::forward_hint(self.session, inner)),
            DecoderKind::Unwrap(field) => self
                .value
                .field(self.session.inferior(), field)
                .map_or(DisplayHint::None, |inner| fields::forward_hint(self.session, inner)),
            _ => DisplayHint::None,
        }
    }

    /// Lazy children of the value.
    ///
    /// ## Errors
    ///
    /// Faults that prevent the sequence from starting at all, such as an
    /// unreadable header or an unresolvable node type. Faults on individual
    /// elements are reported inside the sequence.
    pub fn children(&self) -> VistaResult<Children<'a>>
    {
        let (session, value) = (self.session, self.value);
        match self.kind {
            DecoderKind::Vector => vector::children(session, value),
            DecoderKind::VectorIterator => vector::iterator_children(session, value),
            DecoderKind::String | DecoderKind::StringView | DecoderKind::Function | DecoderKind::Page => {
                Ok(Box::new(std::iter::empty()))
            }
            DecoderKind::List => list::children(session, value),
            DecoderKind::ListIterator => list::iterator_children(session, value),
            DecoderKind::Tree(_) => rbtree::children(session, value),
            DecoderKind::TreeIterator => rbtree::iterator_children(session, value),
            DecoderKind::UniquePtr => smart_ptr::unique_children(session, value),
            DecoderKind::SharedPtr => smart_ptr::shared_children(session, value),
            DecoderKind::NonNull => arc::non_null_children(session, value),
            DecoderKind::Arc => arc::children(session, value),
            DecoderKind::ThreadLocal => percpu::children(session, value),
            DecoderKind::Lock => wrappers::lock_children(session, value),
            DecoderKind::Unwrap(field) => wrappers::unwrap_children(session, value, field),
            DecoderKind::Pair => wrappers::pair_children(session, value),
            DecoderKind::Tuple => Ok(wrappers::tuple_children(session, value)),
            DecoderKind::ReferenceWrapper => wrappers::reference_children(session, value),
            DecoderKind::Dentry => Ok(wrappers::dentry_children(session, value)),
        }
    }
}
