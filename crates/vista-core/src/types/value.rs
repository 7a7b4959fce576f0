//! Typed views into inspected memory.
//!
//! A [`Value`] is an address plus a type. It owns nothing and reads nothing
//! until asked; every read goes through an [`Inferior`] and can fail.

use super::address::Address;
use super::layout::{ScalarKind, TypeId, TypeKind, POINTER_SIZE};
use crate::error::{VistaError, VistaResult};
use crate::inferior::Inferior;

/// Read granularity for strings and readability probes.
const CHUNK: usize = 256;

/// How many single-field wrappers `unwrap_scalar` looks through.
const MAX_WRAPPER_DEPTH: usize = 8;

/// A typed location in inspected memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value
{
    address: Address,
    ty: TypeId,
}

impl Value
{
    #[must_use]
    pub const fn new(address: Address, ty: TypeId) -> Self
    {
        Self { address, ty }
    }

    #[must_use]
    pub const fn address(&self) -> Address
    {
        self.address
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId
    {
        self.ty
    }

    /// Reinterpret the same memory as another type.
    #[must_use]
    pub const fn cast(self, ty: TypeId) -> Self
    {
        Self { address: self.address, ty }
    }

    pub fn size<I: Inferior + ?Sized>(&self, inferior: &I) -> u64
    {
        inferior.types().get(self.ty).size
    }

    pub fn type_name<I: Inferior + ?Sized>(&self, inferior: &I) -> String
    {
        inferior.types().display_name(self.ty)
    }

    /// Project a field by name. Pointers are dereferenced first, so
    /// `node.field("parent")?.field("left")` reads through the parent link.
    pub fn field<I: Inferior + ?Sized>(&self, inferior: &I, name: &str) -> VistaResult<Value>
    {
        if inferior.types().is_pointer(self.ty) {
            let target = self.deref(inferior)?;
            return inferior.read_field(&target, name);
        }
        inferior.read_field(self, name)
    }

    /// Project a dotted path of fields, e.g. `"value.value"`.
    pub fn path<I: Inferior + ?Sized>(&self, inferior: &I, path: &str) -> VistaResult<Value>
    {
        path.split('.').try_fold(*self, |value, name| value.field(inferior, name))
    }

    /// The `index`-th declared field, without looking through bases.
    pub fn field_at<I: Inferior + ?Sized>(&self, inferior: &I, index: usize) -> VistaResult<Value>
    {
        let types = inferior.types();
        let field = types.fields(self.ty).get(index).ok_or_else(|| {
            VistaError::InvalidLayout(format!("{} has no field #{index}", types.display_name(self.ty)))
        })?;
        Ok(Value::new(self.address + field.offset, field.ty))
    }

    /// Declared fields as `(name, view)` pairs.
    pub fn fields<I: Inferior + ?Sized>(&self, inferior: &I) -> Vec<(String, Value)>
    {
        inferior
            .types()
            .fields(self.ty)
            .iter()
            .map(|field| (field.name.clone(), Value::new(self.address + field.offset, field.ty)))
            .collect()
    }

    pub fn deref<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<Value>
    {
        inferior.dereference(self)
    }

    /// Read the address stored in a pointer or reference.
    pub fn read_pointer<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<Address>
    {
        if !inferior.types().is_pointer(self.ty) {
            return Err(VistaError::NotAPointer(self.type_name(inferior)));
        }
        let mut buf = [0u8; POINTER_SIZE as usize];
        inferior.read_memory(self.address, &mut buf)?;
        Ok(Address::new(u64::from_le_bytes(buf)))
    }

    pub fn is_null<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<bool>
    {
        Ok(self.read_pointer(inferior)?.is_null())
    }

    /// Read an unsigned integer of the value's width (1, 2, 4 or 8 bytes).
    pub fn read_unsigned<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<u64>
    {
        let size = self.size(inferior);
        let width = usize::try_from(size).unwrap_or(usize::MAX);
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(VistaError::InvalidLayout(format!(
                "cannot read {} ({size} bytes) as an integer",
                self.type_name(inferior)
            )));
        }
        let mut buf = [0u8; 8];
        inferior.read_memory(self.address, &mut buf[..width])?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a sign-extended integer of the value's width.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_signed<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<i64>
    {
        let raw = self.read_unsigned(inferior)?;
        let bits = self.size(inferior) * 8;
        if bits >= 64 {
            return Ok(raw as i64);
        }
        let shift = 64 - bits;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Look through single-field wrappers (atomics, cells, strong typedefs)
    /// down to the scalar they carry.
    pub fn unwrap_scalar<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<Value>
    {
        let types = inferior.types();
        let mut current = *self;
        for _ in 0..MAX_WRAPPER_DEPTH {
            if types.is_scalar(current.ty) {
                return Ok(current);
            }
            match types.fields(current.ty) {
                [only] => current = Value::new(current.address + only.offset, only.ty),
                _ => break,
            }
        }
        Err(VistaError::InvalidLayout(format!("{} does not wrap a scalar", self.type_name(inferior))))
    }

    /// Read a counter that may sit inside wrapper structs.
    pub fn read_count<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<u64>
    {
        self.unwrap_scalar(inferior)?.read_unsigned(inferior)
    }

    /// Check that every byte of the value can be read.
    pub fn probe<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<()>
    {
        let size = self.size(inferior);
        let mut buf = [0u8; CHUNK];
        let mut offset = 0u64;
        while offset < size {
            let len = usize::try_from((size - offset).min(CHUNK as u64)).unwrap_or(CHUNK);
            inferior.read_memory(self.address + offset, &mut buf[..len])?;
            offset += len as u64;
        }
        Ok(())
    }

    /// Read a NUL-terminated string from an inline char array or through a
    /// char pointer, reading at most `max_len` bytes.
    pub fn read_c_string<I: Inferior + ?Sized>(&self, inferior: &I, max_len: usize) -> VistaResult<String>
    {
        let types = inferior.types();
        match types.get(types.strip(self.ty)).kind {
            TypeKind::Array { len, .. } => {
                let len = usize::try_from(len).unwrap_or(usize::MAX).min(max_len);
                let mut buf = vec![0u8; len];
                inferior.read_memory(self.address, &mut buf)?;
                let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
            }
            TypeKind::Pointer(_) => {
                let start = self.read_pointer(inferior)?;
                if start.is_null() {
                    return Err(VistaError::NullDereference(self.type_name(inferior)));
                }
                read_c_string_at(inferior, start, max_len)
            }
            _ => Err(VistaError::InvalidLayout(format!("{} is not a string", self.type_name(inferior)))),
        }
    }

    /// Render a scalar, pointer or reference the way a debugger prints it.
    /// `None` for records and arrays, which render structurally.
    pub fn format_scalar<I: Inferior + ?Sized>(&self, inferior: &I) -> VistaResult<Option<String>>
    {
        let types = inferior.types();
        let desc = types.get(types.strip(self.ty));
        let text = match desc.kind {
            TypeKind::Scalar(ScalarKind::Signed) => self.read_signed(inferior)?.to_string(),
            TypeKind::Scalar(ScalarKind::Unsigned) => self.read_unsigned(inferior)?.to_string(),
            TypeKind::Scalar(ScalarKind::Bool) => (self.read_unsigned(inferior)? != 0).to_string(),
            TypeKind::Scalar(ScalarKind::Char) => {
                let code = self.read_unsigned(inferior)?;
                match char::from_u32(u32::try_from(code).unwrap_or(u32::MAX)) {
                    Some(c) if !c.is_control() => format!("{code} {c:?}"),
                    _ => code.to_string(),
                }
            }
            TypeKind::Scalar(ScalarKind::Float) => {
                let raw = self.read_unsigned(inferior)?;
                if desc.size == 4 {
                    f32::from_bits(u32::try_from(raw).unwrap_or_default()).to_string()
                } else {
                    f64::from_bits(raw).to_string()
                }
            }
            TypeKind::Pointer(_) => self.read_pointer(inferior)?.to_string(),
            TypeKind::Reference(_) => format!("@{}", self.read_pointer(inferior)?),
            TypeKind::Void | TypeKind::Function => types.display_name(self.ty),
            TypeKind::Struct(_) | TypeKind::Union(_) | TypeKind::Array { .. } | TypeKind::Declared => return Ok(None),
            TypeKind::Typedef(_) | TypeKind::Qualified { .. } => return Ok(None),
        };
        Ok(Some(text))
    }
}

/// Read up to `max_len` bytes starting at `start`, stopping at the first NUL.
pub fn read_c_string_at<I: Inferior + ?Sized>(inferior: &I, start: Address, max_len: usize) -> VistaResult<String>
{
    let mut out = Vec::new();
    let mut cursor = start;
    while out.len() < max_len {
        let mut chunk = vec![0u8; CHUNK.min(max_len - out.len())];
        if inferior.read_memory(cursor, &mut chunk).is_err() {
            // The string may end right before an unmapped page.
            chunk.truncate(1);
            inferior.read_memory(cursor, &mut chunk)?;
        }
        if let Some(end) = chunk.iter().position(|&b| b == 0) {
            out.extend_from_slice(&chunk[..end]);
            return Ok(String::from_utf8_lossy(&out).into_owned());
        }
        cursor = cursor + chunk.len() as u64;
        out.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Read exactly `len` bytes (capped at `max_len`) and decode them as text.
pub fn read_text_at<I: Inferior + ?Sized>(inferior: &I, start: Address, len: u64, max_len: usize) -> VistaResult<String>
{
    let len = usize::try_from(len).unwrap_or(usize::MAX).min(max_len);
    if len == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u8; len];
    inferior.read_memory(start, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
