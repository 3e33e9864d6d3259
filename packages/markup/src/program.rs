//! Instantiation compiler: abstract tree → immutable step program.
//!
//! A compiled [`Program`] is the reusable recipe for stamping out live
//! graphs. It is validated completely at compile time, never mutated
//! afterwards, and `Send + Sync` so it can be shared across threads and
//! executed concurrently by independent instantiation requests.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::markup::ast::{AttrValue, Child, Element};
use crate::markup::parse;
use crate::parse_util::{ParseError, ParseSourceSpan};
use crate::registry::{convert_literal, ChildMode, WidgetClass, WidgetRegistry};
use crate::reflect::{Literal, ValueKind};

/// Name of the reserved attribute that registers a node for named lookup.
pub const NAME_ATTRIBUTE: &str = "Name";

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Allocate a node of the given class and push it as the current scope.
    CreateNode(Arc<WidgetClass>),
    /// Assign a compile-time-converted literal to the current node.
    SetLiteral { property: String, value: Literal },
    /// Record a pending binding on the current node; resolution happens
    /// against the live graph, never here.
    RegisterBinding { property: String, expression: String, two_way: bool },
    /// Give the current node a name for named-descendant lookup.
    RegisterName(String),
    /// Pop the current scope and append it to the children of the scope
    /// below.
    AttachChild,
    /// Pop the finished root scope.
    PopScope,
}

#[derive(Debug, PartialEq)]
pub struct Program {
    steps: Vec<Step>,
}

impl Program {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown type `{tag}` at {span}")]
    UnknownType { tag: String, span: ParseSourceSpan },
    #[error("`{class}` has no assignable property `{property}` at {span}")]
    UnknownProperty { class: String, property: String, span: ParseSourceSpan },
    #[error("cannot convert `{value}` to {expected:?} for `{class}.{property}` at {span}")]
    Conversion {
        class: String,
        property: String,
        value: String,
        expected: ValueKind,
        span: ParseSourceSpan,
    },
    #[error("duplicate name `{name}` at {span}")]
    DuplicateName { name: String, span: ParseSourceSpan },
}

/// Compile an abstract tree against a class registry.
///
/// Deterministic: identical trees yield structurally identical programs.
/// Fails atomically; no partially valid program is ever returned.
pub fn compile(root: &Element, registry: &WidgetRegistry) -> Result<Program, CompileError> {
    let mut compiler = Compiler { registry, steps: Vec::new(), names: HashSet::new() };
    compiler.compile_element(root)?;
    compiler.steps.push(Step::PopScope);
    Ok(Program { steps: compiler.steps })
}

struct Compiler<'a> {
    registry: &'a WidgetRegistry,
    steps: Vec<Step>,
    names: HashSet<String>,
}

impl<'a> Compiler<'a> {
    fn compile_element(&mut self, element: &Element) -> Result<(), CompileError> {
        let class = self.registry.get(&element.tag).ok_or_else(|| CompileError::UnknownType {
            tag: element.tag.clone(),
            span: element.span,
        })?;
        self.steps.push(Step::CreateNode(Arc::clone(&class)));

        for attribute in &element.attributes {
            if attribute.name == NAME_ATTRIBUTE {
                self.compile_name(&class, attribute)?;
                continue;
            }
            let spec = class.spec(&attribute.name).ok_or_else(|| CompileError::UnknownProperty {
                class: class.name.clone(),
                property: attribute.name.clone(),
                span: attribute.span,
            })?;
            match &attribute.value {
                AttrValue::Literal(raw) => {
                    let value = convert_literal(raw, spec.kind).ok_or_else(|| {
                        CompileError::Conversion {
                            class: class.name.clone(),
                            property: attribute.name.clone(),
                            value: raw.clone(),
                            expected: spec.kind,
                            span: attribute.span,
                        }
                    })?;
                    self.steps.push(Step::SetLiteral { property: attribute.name.clone(), value });
                }
                AttrValue::Binding { path, two_way } => {
                    self.steps.push(Step::RegisterBinding {
                        property: attribute.name.clone(),
                        expression: path.clone(),
                        two_way: *two_way,
                    });
                }
            }
        }

        self.compile_text(&class, element)?;
        self.compile_children(&class, element)?;
        Ok(())
    }

    fn compile_name(
        &mut self,
        class: &WidgetClass,
        attribute: &crate::markup::ast::Attribute,
    ) -> Result<(), CompileError> {
        let name = match &attribute.value {
            AttrValue::Literal(name) => name.clone(),
            AttrValue::Binding { path, .. } => {
                return Err(CompileError::Conversion {
                    class: class.name.clone(),
                    property: NAME_ATTRIBUTE.to_string(),
                    value: format!("{{{path}}}"),
                    expected: ValueKind::Str,
                    span: attribute.span,
                })
            }
        };
        if !self.names.insert(name.clone()) {
            return Err(CompileError::DuplicateName { name, span: attribute.span });
        }
        self.steps.push(Step::RegisterName(name));
        Ok(())
    }

    fn compile_text(&mut self, class: &WidgetClass, element: &Element) -> Result<(), CompileError> {
        let mut text = String::new();
        let mut span = None;
        for child in &element.children {
            if let Child::Text(t) = child {
                text.push_str(&t.value);
                span.get_or_insert(t.span);
            }
        }
        let Some(span) = span else { return Ok(()) };
        let trimmed = text.trim().to_string();

        let slot = class.text_slot.as_ref().ok_or_else(|| CompileError::UnknownProperty {
            class: class.name.clone(),
            property: "Text".to_string(),
            span,
        })?;
        let kind = class.spec(slot).map(|s| s.kind).unwrap_or(ValueKind::Str);
        let value =
            convert_literal(&trimmed, kind).ok_or_else(|| CompileError::Conversion {
                class: class.name.clone(),
                property: slot.clone(),
                value: trimmed.clone(),
                expected: kind,
                span,
            })?;
        self.steps.push(Step::SetLiteral { property: slot.clone(), value });
        Ok(())
    }

    fn compile_children(
        &mut self,
        class: &WidgetClass,
        element: &Element,
    ) -> Result<(), CompileError> {
        for (index, child) in element.child_elements().enumerate() {
            let allowed = match class.child_mode {
                ChildMode::None => false,
                ChildMode::Single => index == 0,
                ChildMode::Multiple => true,
            };
            if !allowed {
                return Err(CompileError::UnknownProperty {
                    class: class.name.clone(),
                    property: "Content".to_string(),
                    span: child.span,
                });
            }
            self.compile_element(child)?;
            self.steps.push(Step::AttachChild);
        }
        Ok(())
    }
}

/// Compiled-program cache keyed by source identity.
///
/// A failed compile never touches the cache, so a previously good entry
/// for the same source stays usable.
#[derive(Default)]
pub struct ProgramCache {
    programs: RwLock<HashMap<u64, Arc<Program>>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        ProgramCache::default()
    }

    pub fn compile(
        &self,
        source: &str,
        registry: &WidgetRegistry,
    ) -> Result<Arc<Program>, CompileError> {
        let key = xxh3_64(source.as_bytes());
        if let Some(program) = self.programs.read().get(&key) {
            log::trace!("program cache hit for {key:016x}");
            return Ok(Arc::clone(program));
        }
        let root = parse(source)?;
        let program = Arc::new(compile(&root, registry)?);
        self.programs.write().insert(key, Arc::clone(&program));
        log::debug!("compiled program {key:016x} ({} steps)", program.steps().len());
        Ok(program)
    }

    pub fn get(&self, source: &str) -> Option<Arc<Program>> {
        self.programs.read().get(&xxh3_64(source.as_bytes())).cloned()
    }

    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.read().is_empty()
    }
}
