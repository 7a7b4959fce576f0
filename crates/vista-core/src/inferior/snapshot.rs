//! In-process memory image implementing [`Inferior`].
//!
//! A snapshot is a set of mapped byte regions plus a type table, symbols and
//! registers. Anything outside a mapped region is unreadable, which makes it
//! easy to reproduce dangling pointers and partially paged-out structures.
//!
//! ```rust
//! use vista_core::inferior::{Inferior, SnapshotInferior};
//! use vista_core::types::{ScalarKind, TypeTable};
//!
//! let mut types = TypeTable::new();
//! types.scalar("u32", ScalarKind::Unsigned, 4);
//! let mut snapshot = SnapshotInferior::new(types);
//! let at = snapshot.alloc(4);
//! snapshot.write_u32(at, 7).unwrap();
//!
//! let mut buf = [0u8; 4];
//! snapshot.read_memory(at, &mut buf).unwrap();
//! assert_eq!(u32::from_le_bytes(buf), 7);
//! ```

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::Inferior;
use crate::error::{VistaError, VistaResult};
use crate::types::{Address, TypeTable, Value};

/// First address handed out by [`SnapshotInferior::alloc`].
const ALLOC_BASE: u64 = 0x10_0000;

/// Unmapped gap left after every allocation so overruns fault.
const ALLOC_GUARD: u64 = 0x40;

/// Memory image with types, symbols and registers.
#[derive(Debug, Clone)]
pub struct SnapshotInferior
{
    types: TypeTable,
    regions: BTreeMap<u64, Vec<u8>>,
    symbols: HashMap<String, Value>,
    registers: HashMap<String, u64>,
    next_alloc: u64,
}

impl SnapshotInferior
{
    #[must_use]
    pub fn new(types: TypeTable) -> Self
    {
        Self {
            types,
            regions: BTreeMap::new(),
            symbols: HashMap::new(),
            registers: HashMap::new(),
            next_alloc: ALLOC_BASE,
        }
    }

    pub fn types_mut(&mut self) -> &mut TypeTable
    {
        &mut self.types
    }

    /// Map `bytes` at `address`, replacing any region starting there.
    pub fn map(&mut self, address: Address, bytes: Vec<u8>)
    {
        self.next_alloc = self
            .next_alloc
            .max(address.value().saturating_add(bytes.len() as u64 + ALLOC_GUARD));
        self.regions.insert(address.value(), bytes);
    }

    /// Remove the region starting at `address`, making it unreadable.
    pub fn unmap(&mut self, address: Address) -> bool
    {
        self.regions.remove(&address.value()).is_some()
    }

    /// Map a fresh zeroed region of `len` bytes followed by a guard gap.
    pub fn alloc(&mut self, len: u64) -> Address
    {
        let address = Address::new(self.next_alloc.next_multiple_of(16));
        self.map(address, vec![0; usize::try_from(len).unwrap_or(0)]);
        address
    }

    /// Overwrite mapped bytes.
    ///
    /// ## Errors
    ///
    /// - `Inaccessible`: the range is not entirely inside one mapped region
    pub fn write(&mut self, address: Address, bytes: &[u8]) -> VistaResult<()>
    {
        let (start, region) = self
            .regions
            .range_mut(..=address.value())
            .next_back()
            .ok_or(VistaError::Inaccessible {
                address,
                len: bytes.len() as u64,
            })?;
        let offset = usize::try_from(address.value() - start).unwrap_or(usize::MAX);
        let end = offset.saturating_add(bytes.len());
        if end > region.len() {
            return Err(VistaError::Inaccessible {
                address,
                len: bytes.len() as u64,
            });
        }
        region[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_u8(&mut self, address: Address, value: u8) -> VistaResult<()>
    {
        self.write(address, &[value])
    }

    pub fn write_u32(&mut self, address: Address, value: u32) -> VistaResult<()>
    {
        self.write(address, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, address: Address, value: u64) -> VistaResult<()>
    {
        self.write(address, &value.to_le_bytes())
    }

    pub fn write_pointer(&mut self, address: Address, target: Address) -> VistaResult<()>
    {
        self.write_u64(address, target.value())
    }

    /// Register a symbol. For per-CPU storage `value`'s address is the
    /// offset into the per-CPU segment.
    pub fn define_symbol(&mut self, name: &str, value: Value)
    {
        self.symbols.insert(name.to_string(), value);
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, Value)>
    {
        self.symbols.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn set_register(&mut self, name: &str, value: u64)
    {
        self.registers.insert(name.to_string(), value);
    }
}

impl Inferior for SnapshotInferior
{
    fn types(&self) -> &TypeTable
    {
        &self.types
    }

    fn read_memory(&self, address: Address, buf: &mut [u8]) -> VistaResult<()>
    {
        if buf.is_empty() {
            return Ok(());
        }
        let len = buf.len() as u64;
        let fault = || VistaError::Inaccessible { address, len };
        let (start, region) = self.regions.range(..=address.value()).next_back().ok_or_else(fault)?;
        let offset = usize::try_from(address.value() - start).map_err(|_| fault())?;
        let end = offset.checked_add(buf.len()).ok_or_else(fault)?;
        let bytes = region.get(offset..end).ok_or_else(|| {
            trace!(%address, len, "read outside mapped region");
            fault()
        })?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn lookup_symbol(&self, name: &str) -> VistaResult<Value>
    {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| VistaError::SymbolNotFound(name.to_string()))
    }

    fn read_register(&self, name: &str) -> VistaResult<u64>
    {
        self.registers
            .get(name)
            .copied()
            .ok_or_else(|| VistaError::RegisterUnavailable(name.to_string()))
    }
}
