//! Constructible node classes.
//!
//! A `WidgetClass` declares what the compiler may validate against: the
//! properties a tag accepts, its child arity, and an optional text slot for
//! text-bearing leaf tags. The registry is passed explicitly to the
//! compiler; there is no ambient global catalogue.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::reflect::{Literal, PropertyFlags, ValueKind};

/// How many element children a class accepts. `Single` classes expose the
/// distinguished `Content` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMode {
    None,
    Single,
    Multiple,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub kind: ValueKind,
    pub default: Option<Literal>,
    pub flags: PropertyFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetClass {
    pub name: String,
    pub properties: IndexMap<String, PropertySpec>,
    pub child_mode: ChildMode,
    /// Property that receives text content of this tag, when declared.
    pub text_slot: Option<String>,
}

impl WidgetClass {
    pub fn new(name: impl Into<String>) -> Self {
        WidgetClass {
            name: name.into(),
            properties: IndexMap::new(),
            child_mode: ChildMode::None,
            text_slot: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.properties.insert(
            name.into(),
            PropertySpec { kind, default: None, flags: PropertyFlags::read_write() },
        );
        self
    }

    pub fn property_default(
        mut self,
        name: impl Into<String>,
        kind: ValueKind,
        default: Literal,
    ) -> Self {
        self.properties.insert(
            name.into(),
            PropertySpec { kind, default: Some(default), flags: PropertyFlags::read_write() },
        );
        self
    }

    pub fn single_child(mut self) -> Self {
        self.child_mode = ChildMode::Single;
        self
    }

    pub fn multiple_children(mut self) -> Self {
        self.child_mode = ChildMode::Multiple;
        self
    }

    /// Declare `property` as the target of text content. The property must
    /// already be declared.
    pub fn text_slot(mut self, property: impl Into<String>) -> Self {
        self.text_slot = Some(property.into());
        self
    }

    pub fn spec(&self, property: &str) -> Option<&PropertySpec> {
        self.properties.get(property)
    }
}

/// Tag name → class catalogue consulted by the compiler.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    classes: IndexMap<String, Arc<WidgetClass>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        WidgetRegistry::default()
    }

    pub fn register(&mut self, class: WidgetClass) -> &mut Self {
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<WidgetClass>> {
        self.classes.get(tag).cloned()
    }
}

/// Convert a literal attribute string to the declared kind. `None` means
/// the literal does not parse as that kind; binding-only kinds (`Object`,
/// `List`) never accept literals.
pub fn convert_literal(raw: &str, kind: ValueKind) -> Option<Literal> {
    match kind {
        ValueKind::Str | ValueKind::Any => Some(Literal::Str(raw.to_string())),
        ValueKind::Bool => match raw {
            "true" | "True" => Some(Literal::Bool(true)),
            "false" | "False" => Some(Literal::Bool(false)),
            _ => None,
        },
        ValueKind::Int => raw.parse::<i64>().ok().map(Literal::Int),
        ValueKind::Float => raw.parse::<f64>().ok().map(Literal::Float),
        ValueKind::Object | ValueKind::List => None,
    }
}
