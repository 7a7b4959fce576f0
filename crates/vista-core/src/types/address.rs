//! Inspected-memory address type.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Strongly typed address in the inspected process
///
/// Decoders compare addresses for identity (list sentinels, tree parent
/// links) and step through element buffers, so keeping them apart from plain
/// sizes and counts catches a whole class of mix-ups at compile time.
///
/// Addresses print as `0x` followed by lowercase hex without padding, which is
/// the form every decoder summary uses.
///
/// ## Example
///
/// ```rust
/// use vista_core::types::Address;
///
/// let base = Address::from(0x1000);
/// assert_eq!(base.element(3, 8), Address::new(0x1018));
/// assert_eq!(base.to_string(), "0x1000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address
{
    /// The null address, used as the "no node" sentinel by every pointer-based layout.
    pub const NULL: Self = Address(0);

    /// Create a new address from a `u64` value.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Address of element `index` in a buffer of `stride`-byte elements starting here.
    ///
    /// Wraps on overflow, like pointer arithmetic in the inspected program.
    pub fn element(self, index: u64, stride: u64) -> Self
    {
        Address(self.0.wrapping_add(index.wrapping_mul(stride)))
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
