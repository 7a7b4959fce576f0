//! # Limits
//!
//! Bounds that keep every decode interactive, even against corrupted memory.
//!
//! ## Environment Variables
//!
//! - `VISTA_MAX_DEPTH`: how deep the renderer expands nested values
//! - `VISTA_MAX_CHILDREN`: children rendered per node before eliding the rest
//! - `VISTA_MAX_ELEMENTS`: hard cap on elements a single container decoder yields
//! - `VISTA_MAX_STRING_LEN`: bytes read for one string

use std::env;

use tracing::warn;

/// Bounds applied by decoders and the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits
{
    pub max_depth: usize,
    pub max_children: usize,
    pub max_elements: u64,
    pub max_string_len: usize,
}

impl Default for Limits
{
    fn default() -> Self
    {
        Self {
            max_depth: 8,
            max_children: 200,
            max_elements: 10_000,
            max_string_len: 4096,
        }
    }
}

impl Limits
{
    /// Defaults overridden by `VISTA_*` environment variables.
    ///
    /// Values that do not parse are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self
    {
        let defaults = Self::default();
        Self {
            max_depth: env_or("VISTA_MAX_DEPTH", defaults.max_depth),
            max_children: env_or("VISTA_MAX_CHILDREN", defaults.max_children),
            max_elements: env_or("VISTA_MAX_ELEMENTS", defaults.max_elements),
            max_string_len: env_or("VISTA_MAX_STRING_LEN", defaults.max_string_len),
        }
    }
}

fn env_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "ignoring unparsable limit");
            default
        }),
        Err(_) => default,
    }
}
