//! # Tree Renderer
//!
//! Expands a value into a [`ValueTree`] by repeatedly asking the registry for
//! decoders. Values without a decoder render as a scalar with their raw fields
//! as children.
//!
//! Expansion stops at [`Limits::max_depth`](crate::Limits::max_depth), and each
//! node keeps at most [`Limits::max_children`](crate::Limits::max_children)
//! children followed by a `...` marker. A fault is written into the node that
//! raised it as `<error: ...>`; its siblings and parents still render.

use std::fmt;

use serde::Serialize;

use crate::decode::fields::delegate_children;
use crate::decode::{ChildValue, Children, DisplayHint, Session};
use crate::error::{VistaError, VistaResult};
use crate::types::Value;

/// Label of the marker node that stands for elided children.
pub const ELIDED_LABEL: &str = "...";

/// A rendered value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueTree
{
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub hint: DisplayHint,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ValueTree>,
}

impl ValueTree
{
    fn leaf(label: impl Into<String>, summary: impl Into<String>) -> Self
    {
        Self {
            label: label.into(),
            type_name: None,
            summary: Some(summary.into()),
            hint: DisplayHint::None,
            children: Vec::new(),
        }
    }

    /// Find a direct child by label.
    #[must_use]
    pub fn child(&self, label: &str) -> Option<&ValueTree>
    {
        self.children.iter().find(|child| child.label == label)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result
    {
        write!(f, "{:indent$}{}", "", self.label, indent = depth * 2)?;
        if let Some(type_name) = &self.type_name {
            write!(f, ": {type_name}")?;
        }
        if let Some(summary) = &self.summary {
            match self.hint {
                DisplayHint::Text => write!(f, " = {summary:?}")?,
                _ => write!(f, " = {summary}")?,
            }
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ValueTree
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        self.write_indented(f, 0)
    }
}

fn error_text(err: &VistaError) -> String
{
    format!("<error: {err}>")
}

/// Render `value` under `label`.
#[must_use]
pub fn render(session: Session<'_>, label: &str, value: Value) -> ValueTree
{
    render_at(session, label.to_string(), value, 0)
}

/// Render a global symbol by name.
///
/// ## Errors
///
/// - `SymbolNotFound`: the inferior has no such symbol
pub fn render_symbol(session: Session<'_>, name: &str) -> VistaResult<ValueTree>
{
    let value = session.inferior().lookup_symbol(name)?;
    Ok(render(session, name, value))
}

fn render_at(session: Session<'_>, label: String, value: Value, depth: usize) -> ValueTree
{
    let inferior = session.inferior();
    let mut node = ValueTree {
        label,
        type_name: Some(value.type_name(inferior)),
        summary: None,
        hint: DisplayHint::None,
        children: Vec::new(),
    };

    let decoder = session.select(value);
    let summary = match &decoder {
        Some(decoder) => {
            node.hint = decoder.display_hint();
            decoder.summary()
        }
        None => value.format_scalar(inferior),
    };
    node.summary = summary.unwrap_or_else(|err| Some(error_text(&err)));

    if depth >= session.limits().max_depth {
        return node;
    }
    let children = match decoder {
        Some(decoder) => decoder.children(),
        None => Ok(delegate_children(session, value)),
    };
    match children {
        Ok(children) => node.children = render_children(session, children, depth + 1),
        Err(err) => node.children.push(ValueTree::leaf("[error]", error_text(&err))),
    }
    node
}

fn render_children(session: Session<'_>, children: Children<'_>, depth: usize) -> Vec<ValueTree>
{
    let max = session.limits().max_children;
    let mut children = children.peekable();
    let mut rendered = Vec::new();
    while rendered.len() < max {
        let Some(child) = children.next() else {
            return rendered;
        };
        rendered.push(match child.value {
            ChildValue::Value(value) => render_at(session, child.label, value, depth),
            ChildValue::Text(text) => ValueTree::leaf(child.label, text),
        });
    }
    if children.peek().is_some() {
        rendered.push(ValueTree::leaf(ELIDED_LABEL, format!("more than {max} children")));
    }
    rendered
}
