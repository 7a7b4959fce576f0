//! JSON description of a [`SnapshotInferior`].
//!
//! Types refer to each other by name, so a list node may point at itself and
//! declarations may come in any order:
//!
//! ```json
//! {
//!   "types": [
//!     { "kind": "scalar", "name": "int", "size": 4, "encoding": "signed" },
//!     { "kind": "pointer", "target": "int" },
//!     { "kind": "struct", "name": "span", "fields": [
//!         { "name": "data", "type": "int*" },
//!         { "name": "len", "type": "int" } ] }
//!   ],
//!   "memory": [ { "address": 4096, "bytes": "0100000002000000" } ],
//!   "symbols": [ { "name": "numbers", "address": 8192, "type": "span" } ],
//!   "registers": { "gs_base": 0 }
//! }
//! ```
//!
//! Pointers, references and arrays without an explicit `name` are keyed as
//! `T*`, `T&` and `T[N]`. Struct fields without an `offset` are laid out with
//! C alignment rules.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use data_encoding::HEXLOWER_PERMISSIVE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::snapshot::SnapshotInferior;
use crate::error::{VistaError, VistaResult};
use crate::types::{
    Address, Qualifier, ScalarKind, StructBuilder, TypeDesc, TypeId, TypeKind, TypeTable, Value,
};

/// Top-level snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFile
{
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub memory: Vec<RegionSpec>,
    #[serde(default)]
    pub symbols: Vec<SymbolSpec>,
    #[serde(default)]
    pub registers: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeSpec
{
    Void
    {
        name: String,
    },
    Scalar
    {
        name: String,
        size: u64,
        #[serde(default)]
        encoding: ScalarKind,
    },
    Pointer
    {
        #[serde(default)]
        name: Option<String>,
        target: String,
    },
    Reference
    {
        #[serde(default)]
        name: Option<String>,
        target: String,
    },
    Array
    {
        #[serde(default)]
        name: Option<String>,
        element: String,
        len: u64,
    },
    Struct
    {
        name: String,
        #[serde(default)]
        fields: Vec<FieldSpec>,
        #[serde(default)]
        size: Option<u64>,
    },
    Union
    {
        name: String,
        #[serde(default)]
        fields: Vec<FieldSpec>,
        #[serde(default)]
        size: Option<u64>,
    },
    Typedef
    {
        name: String,
        target: String,
    },
    Const
    {
        #[serde(default)]
        name: Option<String>,
        target: String,
    },
    Function
    {
        name: String,
    },
}

impl TypeSpec
{
    /// Name other entries use to refer to this type.
    #[must_use]
    pub fn key(&self) -> String
    {
        match self {
            TypeSpec::Void { name }
            | TypeSpec::Scalar { name, .. }
            | TypeSpec::Struct { name, .. }
            | TypeSpec::Union { name, .. }
            | TypeSpec::Typedef { name, .. }
            | TypeSpec::Function { name } => name.clone(),
            TypeSpec::Pointer { name, target } => name.clone().unwrap_or_else(|| format!("{target}*")),
            TypeSpec::Reference { name, target } => name.clone().unwrap_or_else(|| format!("{target}&")),
            TypeSpec::Array { name, element, len } => name.clone().unwrap_or_else(|| format!("{element}[{len}]")),
            TypeSpec::Const { name, target } => name.clone().unwrap_or_else(|| format!("const {target}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec
{
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub base: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec
{
    pub address: u64,
    /// Hex-encoded contents; whitespace is ignored.
    pub bytes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec
{
    pub name: String,
    pub address: u64,
    #[serde(rename = "type")]
    pub ty: String,
}

impl SnapshotFile
{
    /// Parse a snapshot document from JSON text.
    ///
    /// ## Errors
    ///
    /// - `Json`: the text is not a valid snapshot document
    pub fn from_json(text: &str) -> VistaResult<Self>
    {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a snapshot file.
    ///
    /// ## Errors
    ///
    /// - `Io`: the file cannot be read
    /// - `Json`: the file is not a valid snapshot document
    pub fn load(path: &Path) -> VistaResult<Self>
    {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Build the memory image this document describes.
    ///
    /// ## Errors
    ///
    /// - `Snapshot`: an entry references an unknown type, contains a type by
    ///   value in itself, or has malformed hex bytes
    pub fn into_inferior(self) -> VistaResult<SnapshotInferior>
    {
        let types = TypeLoader::new(&self.types)?.load()?;
        let mut snapshot = SnapshotInferior::new(types);

        for region in &self.memory {
            let compact: String = region.bytes.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = HEXLOWER_PERMISSIVE.decode(compact.as_bytes()).map_err(|err| {
                VistaError::Snapshot(format!("region at {:#x}: {err}", region.address))
            })?;
            debug!(address = region.address, len = bytes.len(), "mapping snapshot region");
            snapshot.map(Address::new(region.address), bytes);
        }

        for symbol in &self.symbols {
            let ty = snapshot
                .types_mut()
                .lookup(&symbol.ty)
                .ok_or_else(|| VistaError::Snapshot(format!("symbol {}: unknown type {}", symbol.name, symbol.ty)))?;
            snapshot.define_symbol(&symbol.name, Value::new(Address::new(symbol.address), ty));
        }

        for (name, value) in &self.registers {
            snapshot.set_register(name, *value);
        }

        Ok(snapshot)
    }
}

/// Defines types in dependency order: a struct needs the size of every type
/// it contains by value, while pointers only need their target declared.
struct TypeLoader<'a>
{
    specs: HashMap<String, &'a TypeSpec>,
    order: Vec<String>,
    table: TypeTable,
    defined: HashSet<String>,
    in_progress: HashSet<String>,
}

impl<'a> TypeLoader<'a>
{
    fn new(specs: &'a [TypeSpec]) -> VistaResult<Self>
    {
        let mut by_key = HashMap::new();
        let mut order = Vec::new();
        let mut table = TypeTable::new();
        for spec in specs {
            let key = spec.key();
            if by_key.insert(key.clone(), spec).is_some() {
                return Err(VistaError::Snapshot(format!("duplicate type {key}")));
            }
            table.declare(&key);
            order.push(key);
        }
        Ok(Self {
            specs: by_key,
            order,
            table,
            defined: HashSet::new(),
            in_progress: HashSet::new(),
        })
    }

    fn load(mut self) -> VistaResult<TypeTable>
    {
        for key in self.order.clone() {
            self.define(&key)?;
        }
        Ok(self.table)
    }

    fn declared(&self, key: &str) -> VistaResult<TypeId>
    {
        self.table
            .lookup(key)
            .ok_or_else(|| VistaError::Snapshot(format!("unknown type {key}")))
    }

    /// Define `key` after every type it holds by value.
    fn define(&mut self, key: &str) -> VistaResult<TypeId>
    {
        let id = self.declared(key)?;
        if self.defined.contains(key) {
            return Ok(id);
        }
        if !self.in_progress.insert(key.to_string()) {
            return Err(VistaError::Snapshot(format!("type {key} contains itself by value")));
        }
        let spec = self.specs[key];

        let kind_and_layout = match spec {
            TypeSpec::Void { .. } => (TypeKind::Void, 0, 1),
            TypeSpec::Function { .. } => (TypeKind::Function, 1, 1),
            TypeSpec::Scalar { size, encoding, .. } => (TypeKind::Scalar(*encoding), *size, (*size).max(1)),
            TypeSpec::Pointer { target, .. } => {
                let target = self.declared(target)?;
                (TypeKind::Pointer(target), 8, 8)
            }
            TypeSpec::Reference { target, .. } => {
                let target = self.declared(target)?;
                (TypeKind::Reference(target), 8, 8)
            }
            TypeSpec::Array { element, len, .. } => {
                let element = self.define(element)?;
                let desc = self.table.get(element);
                (TypeKind::Array { element, len: *len }, desc.size.saturating_mul(*len), desc.align)
            }
            TypeSpec::Typedef { target, .. } => {
                let target = self.define(target)?;
                let desc = self.table.get(target);
                (TypeKind::Typedef(target), desc.size, desc.align)
            }
            TypeSpec::Const { target, .. } => {
                let target = self.define(target)?;
                let desc = self.table.get(target);
                (
                    TypeKind::Qualified {
                        qualifier: Qualifier::Const,
                        target,
                    },
                    desc.size,
                    desc.align,
                )
            }
            TypeSpec::Struct { name, fields, size } | TypeSpec::Union { name, fields, size } => {
                let mut builder = StructBuilder::new(name);
                if matches!(spec, TypeSpec::Union { .. }) {
                    builder = builder.union();
                }
                for field in fields {
                    let ty = self.define(&field.ty)?;
                    builder = match (field.base, field.offset) {
                        (true, _) => builder.base(&field.name, ty),
                        (false, Some(offset)) => builder.field_at(&field.name, ty, offset),
                        (false, None) => builder.field(&field.name, ty),
                    };
                }
                if let Some(size) = size {
                    builder = builder.size(*size);
                }
                let id = builder.finish(&mut self.table).map_err(|err| match err {
                    VistaError::InvalidLayout(reason) => VistaError::Snapshot(reason),
                    other => other,
                })?;
                self.finish(key);
                return Ok(id);
            }
        };

        let (kind, size, align) = kind_and_layout;
        let id = self.table.insert(TypeDesc {
            name: Some(key.to_string()),
            size,
            align,
            kind,
        });
        self.finish(key);
        Ok(id)
    }

    fn finish(&mut self, key: &str)
    {
        self.in_progress.remove(key);
        self.defined.insert(key.to_string());
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::inferior::Inferior;

    #[test]
    fn test_self_referential_node()
    {
        let file = SnapshotFile::from_json(
            r#"{
                "types": [
                    { "kind": "pointer", "target": "node" },
                    { "kind": "struct", "name": "node", "fields": [
                        { "name": "next", "type": "node*" },
                        { "name": "value", "type": "u32" } ] },
                    { "kind": "scalar", "name": "u32", "size": 4 }
                ]
            }"#,
        )
        .unwrap();
        let snapshot = file.into_inferior().unwrap();
        let node = snapshot.resolve_type("node").unwrap();
        assert_eq!(snapshot.types().get(node).size, 16);
        assert_eq!(snapshot.types().find_field(node, "value").unwrap().offset, 8);
    }

    #[test]
    fn test_by_value_cycle_is_rejected()
    {
        let file = SnapshotFile::from_json(
            r#"{ "types": [ { "kind": "struct", "name": "a", "fields": [ { "name": "x", "type": "a" } ] } ] }"#,
        )
        .unwrap();
        assert!(matches!(file.into_inferior(), Err(VistaError::Snapshot(_))));
    }

    #[test]
    fn test_overflowing_field_offset_is_rejected()
    {
        let file = SnapshotFile::from_json(
            r#"{
                "types": [
                    { "kind": "scalar", "name": "u32", "size": 4 },
                    { "kind": "struct", "name": "s", "fields": [
                        { "name": "x", "type": "u32", "offset": 18446744073709551615 } ] }
                ]
            }"#,
        )
        .unwrap();
        let err = file.into_inferior().unwrap_err();
        assert!(matches!(&err, VistaError::Snapshot(reason) if reason == "field x of s: offset overflows"));
    }

    #[test]
    fn test_overflowing_struct_size_is_rejected()
    {
        let file = SnapshotFile::from_json(
            r#"{
                "types": [
                    { "kind": "scalar", "name": "u64", "size": 8 },
                    { "kind": "scalar", "name": "u8", "size": 1 },
                    { "kind": "struct", "name": "s", "fields": [
                        { "name": "tag", "type": "u8", "offset": 18446744073709551614 },
                        { "name": "word", "type": "u64", "offset": 0 } ] }
                ]
            }"#,
        )
        .unwrap();
        assert!(matches!(file.into_inferior(), Err(VistaError::Snapshot(reason)) if reason == "s: size overflows"));
    }

    #[test]
    fn test_bad_hex_is_rejected()
    {
        let file = SnapshotFile::from_json(r#"{ "memory": [ { "address": 16, "bytes": "zz" } ] }"#).unwrap();
        assert!(matches!(file.into_inferior(), Err(VistaError::Snapshot(_))));
    }
}
