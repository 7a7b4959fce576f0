//! Small-buffer-optimized string and string view.
//!
//! ```text
//! std::basic_string<C>
//!   m_data  compressed pair (repr, alloc)
//!     repr.in  union
//!       stackdata { C str[N]; C end; }   inline storage
//!       heapdata  { C* m_ptr; ... }      owned buffer
//! ```
//!
//! `stackdata.end == 0` marks a heap-resident string; any other value means
//! the text lives in `stackdata.str`. For inline text `end` holds the unused
//! inline capacity counting the NUL slot, so the inline buffer keeps at most
//! `N - 1` bytes and `end` is at least one. Both forms are NUL terminated and
//! are read with a bounded scan.

use super::pair::unpack;
use super::Session;
use crate::error::VistaResult;
use crate::types::{read_text_at, Value};

pub fn summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let max_len = session.limits().max_string_len;
    let (repr, _alloc) = unpack(inferior, &value.field(inferior, "m_data")?)?;
    let storage = repr.field(inferior, "in")?;

    let end = storage.path(inferior, "stackdata.end")?.read_unsigned(inferior)?;
    let text = if end == 0 {
        storage.path(inferior, "heapdata.m_ptr")?.read_c_string(inferior, max_len)?
    } else {
        storage.path(inferior, "stackdata.str")?.read_c_string(inferior, max_len)?
    };
    Ok(Some(text))
}

/// Exactly `m_len` bytes starting at `m_str`.
pub fn view_summary(session: Session<'_>, value: Value) -> VistaResult<Option<String>>
{
    let inferior = session.inferior();
    let len = value.field(inferior, "m_len")?.read_count(inferior)?;
    let start = value.field(inferior, "m_str")?.read_pointer(inferior)?;
    Ok(Some(read_text_at(inferior, start, len, session.limits().max_string_len)?))
}
