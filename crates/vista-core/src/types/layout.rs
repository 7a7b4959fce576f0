//! Type descriptors and struct layout.
//!
//! Types live in a [`TypeTable`] arena and are referenced by [`TypeId`]. The
//! arena form lets node types refer to themselves through pointers (a tree
//! node's `parent`, a list node's `next`) without reference cycles: declare the
//! name first, build pointers to it, then define it.
//!
//! Layouts assume a 64-bit little-endian target.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{VistaError, VistaResult};

/// Size in bytes of pointers and references on the inspected target.
pub const POINTER_SIZE: u64 = 8;

/// Depth bound for walks over base-class chains and typedef chains.
const MAX_TYPE_DEPTH: usize = 32;

/// Index of a type inside a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId
{
    /// Raw arena index.
    #[must_use]
    pub const fn index(self) -> usize
    {
        self.0 as usize
    }
}

/// Encoding of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind
{
    Signed,
    #[default]
    Unsigned,
    Bool,
    Char,
    Float,
}

/// cv-qualifier wrapped around another type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier
{
    Const,
    Volatile,
}

/// A declared member of a struct or union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field
{
    pub name: String,
    pub ty: TypeId,
    /// Byte offset from the start of the enclosing record.
    pub offset: u64,
    /// Inherited base rather than a named member. Empty bases take no storage.
    pub base: bool,
}

pub type Fields = SmallVec<[Field; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind
{
    /// Named but not yet defined (forward declaration).
    Declared,
    Void,
    Scalar(ScalarKind),
    Pointer(TypeId),
    Reference(TypeId),
    Array
    {
        element: TypeId,
        len: u64,
    },
    Struct(Fields),
    Union(Fields),
    Typedef(TypeId),
    Qualified
    {
        qualifier: Qualifier,
        target: TypeId,
    },
    Function,
}

/// One entry of the type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc
{
    pub name: Option<String>,
    pub size: u64,
    pub align: u64,
    pub kind: TypeKind,
}

/// Resolved location of a (possibly inherited) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef
{
    pub offset: u64,
    pub ty: TypeId,
}

/// Arena of type descriptors with a by-name index.
#[derive(Debug, Clone, Default)]
pub struct TypeTable
{
    types: Vec<TypeDesc>,
    by_name: HashMap<String, TypeId>,
    pointers: HashMap<TypeId, TypeId>,
}

impl TypeTable
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Number of types in the table.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.types.is_empty()
    }

    /// Descriptor for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different table.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &TypeDesc
    {
        &self.types[id.index()]
    }

    /// Find a named type.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId>
    {
        self.by_name.get(name).copied()
    }

    /// Add a descriptor. A named descriptor replaces a forward declaration of
    /// the same name in place, so ids handed out by [`declare`](Self::declare)
    /// stay valid.
    pub fn insert(&mut self, desc: TypeDesc) -> TypeId
    {
        if let Some(name) = &desc.name {
            if let Some(&id) = self.by_name.get(name) {
                if self.types[id.index()].kind == TypeKind::Declared {
                    self.types[id.index()] = desc;
                    return id;
                }
            }
        }

        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        if let Some(name) = &desc.name {
            self.by_name.insert(name.clone(), id);
        }
        self.types.push(desc);
        id
    }

    /// Forward-declare a named type, or return the existing id for that name.
    pub fn declare(&mut self, name: &str) -> TypeId
    {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        self.insert(TypeDesc {
            name: Some(name.to_string()),
            size: 0,
            align: 1,
            kind: TypeKind::Declared,
        })
    }

    pub fn void(&mut self) -> TypeId
    {
        if let Some(id) = self.lookup("void") {
            return id;
        }
        self.insert(TypeDesc {
            name: Some("void".to_string()),
            size: 0,
            align: 1,
            kind: TypeKind::Void,
        })
    }

    /// Add a named scalar of `size` bytes.
    pub fn scalar(&mut self, name: &str, kind: ScalarKind, size: u64) -> TypeId
    {
        self.insert(TypeDesc {
            name: Some(name.to_string()),
            size,
            align: size.max(1),
            kind: TypeKind::Scalar(kind),
        })
    }

    /// Unnamed pointer to `target`. Repeated calls return the same id.
    pub fn pointer_to(&mut self, target: TypeId) -> TypeId
    {
        if let Some(&id) = self.pointers.get(&target) {
            return id;
        }
        let id = self.insert(TypeDesc {
            name: None,
            size: POINTER_SIZE,
            align: POINTER_SIZE,
            kind: TypeKind::Pointer(target),
        });
        self.pointers.insert(target, id);
        id
    }

    pub fn reference_to(&mut self, target: TypeId) -> TypeId
    {
        self.insert(TypeDesc {
            name: None,
            size: POINTER_SIZE,
            align: POINTER_SIZE,
            kind: TypeKind::Reference(target),
        })
    }

    pub fn array_of(&mut self, element: TypeId, len: u64) -> TypeId
    {
        let elem = self.get(element);
        let (size, align) = (elem.size.saturating_mul(len), elem.align);
        self.insert(TypeDesc {
            name: None,
            size,
            align,
            kind: TypeKind::Array { element, len },
        })
    }

    pub fn typedef(&mut self, name: &str, target: TypeId) -> TypeId
    {
        let (size, align) = (self.get(target).size, self.get(target).align);
        self.insert(TypeDesc {
            name: Some(name.to_string()),
            size,
            align,
            kind: TypeKind::Typedef(target),
        })
    }

    pub fn qualified(&mut self, qualifier: Qualifier, target: TypeId) -> TypeId
    {
        let (size, align) = (self.get(target).size, self.get(target).align);
        self.insert(TypeDesc {
            name: None,
            size,
            align,
            kind: TypeKind::Qualified { qualifier, target },
        })
    }

    pub fn function(&mut self, name: &str) -> TypeId
    {
        self.insert(TypeDesc {
            name: Some(name.to_string()),
            size: 1,
            align: 1,
            kind: TypeKind::Function,
        })
    }

    /// Strip typedefs and cv-qualifiers.
    #[must_use]
    pub fn strip(&self, mut id: TypeId) -> TypeId
    {
        for _ in 0..MAX_TYPE_DEPTH {
            match self.get(id).kind {
                TypeKind::Typedef(target) | TypeKind::Qualified { target, .. } => id = target,
                _ => break,
            }
        }
        id
    }

    /// Target of a pointer or reference type, after stripping.
    #[must_use]
    pub fn target(&self, id: TypeId) -> Option<TypeId>
    {
        match self.get(self.strip(id)).kind {
            TypeKind::Pointer(target) | TypeKind::Reference(target) => Some(target),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_pointer(&self, id: TypeId) -> bool
    {
        self.target(id).is_some()
    }

    /// Whether values of this type render as a single scalar (numbers,
    /// pointers, references).
    #[must_use]
    pub fn is_scalar(&self, id: TypeId) -> bool
    {
        matches!(
            self.get(self.strip(id)).kind,
            TypeKind::Scalar(_) | TypeKind::Pointer(_) | TypeKind::Reference(_)
        )
    }

    /// Declared fields of a struct or union, after stripping. Empty for every
    /// other kind.
    #[must_use]
    pub fn fields(&self, id: TypeId) -> &[Field]
    {
        match &self.get(self.strip(id)).kind {
            TypeKind::Struct(fields) | TypeKind::Union(fields) => fields,
            _ => &[],
        }
    }

    /// Find a field by name, looking through inherited bases.
    #[must_use]
    pub fn find_field(&self, id: TypeId, name: &str) -> Option<FieldRef>
    {
        self.find_field_at_depth(id, name, 0)
    }

    fn find_field_at_depth(&self, id: TypeId, name: &str, depth: usize) -> Option<FieldRef>
    {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let fields = self.fields(id);
        if let Some(field) = fields.iter().find(|field| field.name == name) {
            return Some(FieldRef {
                offset: field.offset,
                ty: field.ty,
            });
        }
        fields.iter().filter(|field| field.base).find_map(|field| {
            self.find_field_at_depth(field.ty, name, depth + 1)
                .map(|inner| FieldRef {
                    offset: field.offset + inner.offset,
                    ty: inner.ty,
                })
        })
    }

    /// Whether a struct carries no data (only empty bases, or nothing at all).
    #[must_use]
    pub fn is_empty_record(&self, id: TypeId) -> bool
    {
        self.is_empty_record_at_depth(id, 0)
    }

    fn is_empty_record_at_depth(&self, id: TypeId, depth: usize) -> bool
    {
        if depth > MAX_TYPE_DEPTH {
            return false;
        }
        match &self.get(self.strip(id)).kind {
            TypeKind::Struct(fields) => fields
                .iter()
                .all(|field| field.base && self.is_empty_record_at_depth(field.ty, depth + 1)),
            _ => false,
        }
    }

    /// The name dispatch keys on: strip qualifiers and typedefs, then look
    /// through one level of pointer or reference. `None` for anonymous types.
    #[must_use]
    pub fn structural_name(&self, id: TypeId) -> Option<&str>
    {
        let mut id = self.strip(id);
        if let TypeKind::Pointer(target) | TypeKind::Reference(target) = self.get(id).kind {
            id = self.strip(target);
        }
        self.get(id).name.as_deref()
    }

    /// Human-readable name, synthesized for unnamed derived types.
    #[must_use]
    pub fn display_name(&self, id: TypeId) -> String
    {
        self.display_name_at_depth(id, 0)
    }

    fn display_name_at_depth(&self, id: TypeId, depth: usize) -> String
    {
        let desc = self.get(id);
        if let Some(name) = &desc.name {
            return name.clone();
        }
        if depth > MAX_TYPE_DEPTH {
            return "...".to_string();
        }
        match &desc.kind {
            TypeKind::Pointer(target) => format!("{}*", self.display_name_at_depth(*target, depth + 1)),
            TypeKind::Reference(target) => format!("{}&", self.display_name_at_depth(*target, depth + 1)),
            TypeKind::Array { element, len } => {
                format!("{}[{len}]", self.display_name_at_depth(*element, depth + 1))
            }
            TypeKind::Qualified { qualifier, target } => {
                let keyword = match qualifier {
                    Qualifier::Const => "const",
                    Qualifier::Volatile => "volatile",
                };
                format!("{keyword} {}", self.display_name_at_depth(*target, depth + 1))
            }
            TypeKind::Struct(_) => "<anonymous struct>".to_string(),
            TypeKind::Union(_) => "<anonymous union>".to_string(),
            _ => "<anonymous>".to_string(),
        }
    }
}

/// Builds a struct or union with C layout rules.
///
/// Members are placed at the next offset aligned to their natural alignment.
/// Bases are placed the same way, except that an empty base takes no storage.
/// A record without storage has size one, as in C++.
///
/// ```rust
/// use vista_core::types::{ScalarKind, StructBuilder, TypeTable};
///
/// let mut types = TypeTable::new();
/// let u8_t = types.scalar("u8", ScalarKind::Unsigned, 1);
/// let u64_t = types.scalar("u64", ScalarKind::Unsigned, 8);
/// let id = StructBuilder::new("Header").field("tag", u8_t).field("len", u64_t).finish(&mut types).unwrap();
/// assert_eq!(types.get(id).size, 16);
/// assert_eq!(types.find_field(id, "len").unwrap().offset, 8);
/// ```
#[derive(Debug, Clone)]
pub struct StructBuilder
{
    name: Option<String>,
    union: bool,
    members: Vec<(String, TypeId, bool, Option<u64>)>,
    size: Option<u64>,
}

impl StructBuilder
{
    #[must_use]
    pub fn new(name: &str) -> Self
    {
        Self {
            name: Some(name.to_string()),
            union: false,
            members: Vec::new(),
            size: None,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self
    {
        Self {
            name: None,
            union: false,
            members: Vec::new(),
            size: None,
        }
    }

    /// Lay members out on top of each other.
    #[must_use]
    pub fn union(mut self) -> Self
    {
        self.union = true;
        self
    }

    #[must_use]
    pub fn field(mut self, name: &str, ty: TypeId) -> Self
    {
        self.members.push((name.to_string(), ty, false, None));
        self
    }

    /// Member at an explicit offset.
    #[must_use]
    pub fn field_at(mut self, name: &str, ty: TypeId, offset: u64) -> Self
    {
        self.members.push((name.to_string(), ty, false, Some(offset)));
        self
    }

    /// Inherited base, named after the base type like debuggers do.
    #[must_use]
    pub fn base(mut self, name: &str, ty: TypeId) -> Self
    {
        self.members.push((name.to_string(), ty, true, None));
        self
    }

    /// Override the computed size.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self
    {
        self.size = Some(size);
        self
    }

    /// Compute the layout and add it to `types`, replacing a forward
    /// declaration of the same name.
    ///
    /// ## Errors
    ///
    /// - `InvalidLayout`: an offset or the total size does not fit in 64 bits
    pub fn finish(self, types: &mut TypeTable) -> VistaResult<TypeId>
    {
        let record = self.name.clone().unwrap_or_else(|| "<anonymous>".to_string());
        let overflow = |field: &str| VistaError::InvalidLayout(format!("field {field} of {record}: offset overflows"));

        let mut fields = Fields::new();
        let mut cursor = 0u64;
        let mut end = 0u64;
        let mut align = 1u64;

        for (name, ty, base, offset) in self.members {
            let desc = types.get(ty);
            let (field_size, field_align) = (desc.size, desc.align.max(1));
            let empty_base = base && types.is_empty_record(ty);

            let offset = match offset {
                Some(offset) => offset,
                None if self.union => 0,
                None if empty_base => cursor,
                None => align_up(cursor, field_align).ok_or_else(|| overflow(&name))?,
            };
            let occupied = if empty_base { 0 } else { field_size };
            let field_end = offset.checked_add(occupied).ok_or_else(|| overflow(&name))?;

            align = align.max(field_align);
            end = end.max(field_end);
            if !self.union {
                cursor = field_end;
            }
            fields.push(Field {
                name,
                ty,
                offset,
                base,
            });
        }

        let size = match self.size {
            Some(size) => size,
            None if end == 0 => 1,
            None => align_up(end, align)
                .ok_or_else(|| VistaError::InvalidLayout(format!("{record}: size overflows")))?,
        };
        let kind = if self.union {
            TypeKind::Union(fields)
        } else {
            TypeKind::Struct(fields)
        };

        Ok(types.insert(TypeDesc {
            name: self.name,
            size,
            align,
            kind,
        }))
    }
}

fn align_up(value: u64, align: u64) -> Option<u64>
{
    if align <= 1 {
        return Some(value);
    }
    value.div_ceil(align).checked_mul(align)
}
