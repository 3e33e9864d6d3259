//! Abstract node tree produced by the parser and consumed by the compiler.
//!
//! The tree is immutable once parsed; nothing downstream mutates it.

use serde::{Deserialize, Serialize};

use crate::parse_util::ParseSourceSpan;

/// Marker that makes an attribute value a two-way binding when it is the
/// first character inside the `{...}` delimiters.
pub const TWO_WAY_MARKER: char = '\u{00B2}';

/// An attribute value: either a literal to convert at compile time, or a
/// binding expression to resolve against a live graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    Literal(String),
    Binding { path: String, two_way: bool },
}

impl AttrValue {
    /// Classify a raw attribute value. A value is a binding expression iff
    /// it is wrapped exactly as `{...}`; the two-way marker must be the
    /// first character after removing the delimiters.
    pub fn classify(raw: &str) -> AttrValue {
        if raw.len() >= 2 && raw.starts_with('{') && raw.ends_with('}') {
            let inner = &raw[1..raw.len() - 1];
            match inner.strip_prefix(TWO_WAY_MARKER) {
                Some(path) => AttrValue::Binding { path: path.to_string(), two_way: true },
                None => AttrValue::Binding { path: inner.to_string(), two_way: false },
            }
        } else {
            AttrValue::Literal(raw.to_string())
        }
    }

    pub fn is_binding(&self) -> bool {
        matches!(self, AttrValue::Binding { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub span: ParseSourceSpan,
}

/// Text content of a text-bearing leaf tag. Whitespace-only runs never
/// reach the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
    pub span: ParseSourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Child {
    Element(Element),
    Text(Text),
}

/// An element node: tag identifier, ordered attributes, ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Child>,
    pub span: ParseSourceSpan,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Child::Element(e) => Some(e),
            Child::Text(_) => None,
        })
    }
}
