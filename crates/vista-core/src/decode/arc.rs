//! `NonNull<T>` and `Arc<T>`.
//!
//! A `NonNull` holds its pointer in a field named `pointer`. For sized `T`
//! that field is a plain pointer; for slices it is a wide pointer, a record of
//! (data pointer, element count).
//!
//! An `Arc` holds a `NonNull` to its shared allocation:
//!
//! ```text
//! ArcInner<T>
//!   strong   atomic, integer at .v.value
//!   weak     atomic, integer at .v.value, one higher than the weak handles
//!   data     T
//! ```

use tracing::debug;

use super::fields::delegate_children;
use super::{Child, Children, Session, ERROR_MARKER, INACCESSIBLE_MARKER};
use crate::error::{VistaError, VistaResult};
use crate::inferior::Inferior;
use crate::types::{read_text_at, Address, TypeId, TypeKind, TypeTable, Value};

/// What a `NonNull` points at.
#[derive(Debug, Clone)]
pub struct NonNullTarget
{
    pub address: Address,
    pub ty: TypeId,
    /// Element count of a wide pointer.
    pub length: Option<u64>,
    /// `T` for a thin pointer, `[E]` for a slice of `E`.
    pub label: String,
}

impl NonNullTarget
{
    /// Read the `pointer` field of a `NonNull` value.
    ///
    /// ## Errors
    ///
    /// - `FieldNotFound`: the value has no `pointer` field
    /// - `InvalidLayout`: a wide pointer without two fields
    /// - `Inaccessible`: the pointer or the length cannot be read
    pub fn read(inferior: &dyn Inferior, non_null: Value) -> VistaResult<Self>
    {
        let types = inferior.types();
        let pointer = non_null.field(inferior, "pointer")?;
        if let Some(ty) = types.target(pointer.type_id()) {
            return Ok(Self {
                address: pointer.read_pointer(inferior)?,
                ty,
                length: None,
                label: types.display_name(ty),
            });
        }

        let data = pointer.field_at(inferior, 0)?;
        let length = pointer.field_at(inferior, 1)?.read_count(inferior)?;
        let ty = types
            .target(data.type_id())
            .ok_or_else(|| VistaError::NotAPointer(data.type_name(inferior)))?;
        Ok(Self {
            address: data.read_pointer(inferior)?,
            ty,
            length: Some(length),
            label: format!("[{}]", types.display_name(slice_element(types, ty))),
        })
    }

    fn view(&self) -> VistaResult<Value>
    {
        if self.address.is_null() {
            return Err(VistaError::NullDereference(self.label.clone()));
        }
        Ok(Value::new(self.address, self.ty))
    }
}

/// Element type of an unsized tail: the `data` field's array element when the
/// target wraps the slice, the target itself otherwise.
fn slice_element(types: &TypeTable, target: TypeId) -> TypeId
{
    let carrier = types.find_field(target, "data").map_or(target, |field| field.ty);
    match types.get(types.strip(carrier)).kind {
        TypeKind::Array { element, .. } => element,
        _ => carrier,
    }
}

pub fn non_null_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let target = NonNullTarget::read(session.inferior(), value)?;
    Ok(Some(format!("NonNull<{}>({})", target.label, target.address)))
}

/// The pointee's fields, or a single `[error]` entry if it cannot be reached.
pub fn non_null_children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let pointee = NonNullTarget::read(inferior, value).and_then(|target| {
        let view = target.view()?;
        view.probe(inferior)?;
        Ok(view)
    });
    match pointee {
        Ok(view) => Ok(delegate_children(session, view)),
        Err(err) => {
            debug!(%err, "NonNull target unreadable");
            Ok(Box::new(std::iter::once(Child::text("[error]", ERROR_MARKER))))
        }
    }
}

pub fn summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let target = NonNullTarget::read(inferior, value.field(inferior, "ptr")?)?;
    let inner = target.view()?;

    if let (Some(length), "[u8]") = (target.length, target.label.as_str()) {
        let data = inner.field(inferior, "data")?;
        let text = read_text_at(inferior, data.address(), length, session.limits().max_string_len)?;
        return Ok(Some(format!("Arc({text})")));
    }

    let strong = inner.path(inferior, "strong.v.value")?.read_count(inferior)?;
    let weak = i128::from(inner.path(inferior, "weak.v.value")?.read_count(inferior)?) - 1;
    Ok(Some(format!("Arc(strong={strong}, weak={weak})")))
}

/// Slice payloads yield one entry per element, ending at the first element
/// that cannot be read. Sized payloads yield the payload's fields.
pub fn children<'a>(session: Session<'a>, value: Value) -> VistaResult<Children<'a>>
{
    let inferior = session.inferior();
    let target = NonNullTarget::read(inferior, value.field(inferior, "ptr")?)?;
    let data = target.view()?.field(inferior, "data")?;

    let Some(length) = target.length else {
        return Ok(delegate_children(session, data));
    };

    let types = inferior.types();
    let element = slice_element(types, target.ty);
    let stride = types.get(element).size;
    let length = length.min(session.limits().max_elements);
    let mut index = 0;
    let mut faulted = false;
    Ok(Box::new(std::iter::from_fn(move || {
        if faulted || index >= length {
            return None;
        }
        let item = Value::new(data.address().element(index, stride), element);
        let label = index.to_string();
        index += 1;
        match item.probe(inferior) {
            Ok(()) => Some(Child::value(label, item)),
            Err(err) => {
                debug!(%err, index = index - 1, "slice element inaccessible");
                faulted = true;
                Some(Child::text(label, INACCESSIBLE_MARKER))
            }
        }
    })))
}
