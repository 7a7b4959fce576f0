//! Helpers for structural type names such as
//! `std::list<int, std::allocator<int>>::_iterator<false>`.

/// Split a qualified name at its last top-level `::`, ignoring separators
/// nested inside template arguments.
///
/// ```rust
/// use vista_core::types::names::split_scope;
///
/// assert_eq!(
///     split_scope("std::list<a::b, c>::_iterator<false>"),
///     Some(("std::list<a::b, c>", "_iterator<false>"))
/// );
/// assert_eq!(split_scope("plain"), None);
/// ```
#[must_use]
pub fn split_scope(name: &str) -> Option<(&str, &str)>
{
    let bytes = name.as_bytes();
    let mut depth = 0i32;
    let mut split = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    split.map(|at| (&name[..at], &name[at + 2..]))
}

/// Replace `marker` in the last path segment of `name`.
///
/// Returns `None` when the last segment does not contain the marker.
#[must_use]
pub fn replace_in_last_segment(name: &str, marker: &str, replacement: &str) -> Option<String>
{
    let (scope, last) = match split_scope(name) {
        Some((scope, last)) => (Some(scope), last),
        None => (None, name),
    };
    if !last.contains(marker) {
        return None;
    }
    let last = last.replacen(marker, replacement, 1);
    Some(match scope {
        Some(scope) => format!("{scope}::{last}"),
        None => last,
    })
}
