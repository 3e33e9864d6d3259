//! The live graph: mutable runtime nodes produced by executing a program.
//!
//! Ownership is exclusively structural: a parent's child list owns its
//! children, the caller owns the root, and every back-reference (logical
//! parent, binding targets) is a weak handle. `NodeRef` is `!Send`, which
//! pins all graph mutation to one thread while compiled programs stay
//! freely shareable.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::binding::{self, Binding, BindingError, BindingOptions, MemberRef};
use crate::program::{Program, Step};
use crate::reflect::{ChangeHub, DataRef, PropertyFlags, ReflectError, Value};
use crate::registry::WidgetClass;
use crate::template::TemplateSet;

pub type NodeRef = Rc<RefCell<Node>>;
pub type WeakNodeRef = Weak<RefCell<Node>>;
pub type BindingRef = Rc<RefCell<Binding>>;

pub struct Node {
    class: Arc<WidgetClass>,
    name: Option<String>,
    properties: IndexMap<String, Value>,
    children: Vec<NodeRef>,
    parent: Option<WeakNodeRef>,
    data_source: Option<DataRef>,
    bindings: Vec<BindingRef>,
    templates: Option<Rc<TemplateSet>>,
    hub: Rc<ChangeHub>,
}

impl Node {
    fn new(class: Arc<WidgetClass>) -> NodeRef {
        let mut properties = IndexMap::new();
        for (name, spec) in &class.properties {
            let value = spec.default.as_ref().map(|d| d.to_value()).unwrap_or(Value::Null);
            properties.insert(name.clone(), value);
        }
        Rc::new(RefCell::new(Node {
            class,
            name: None,
            properties,
            children: Vec::new(),
            parent: None,
            data_source: None,
            bindings: Vec::new(),
            templates: None,
            hub: Rc::new(ChangeHub::new()),
        }))
    }

    pub fn class(&self) -> &Arc<WidgetClass> {
        &self.class
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn data_source(&self) -> Option<&DataRef> {
        self.data_source.as_ref()
    }

    pub fn bindings(&self) -> &[BindingRef] {
        &self.bindings
    }

    pub fn templates(&self) -> Option<&Rc<TemplateSet>> {
        self.templates.as_ref()
    }

    pub fn set_templates(&mut self, templates: Rc<TemplateSet>) {
        self.templates = Some(templates);
    }

    /// The node's change hub; fired by [`set_property`].
    pub fn hub(&self) -> Rc<ChangeHub> {
        Rc::clone(&self.hub)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("class", &self.class.name)
            .field("name", &self.name)
            .field("children", &self.children.len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Interpret a compiled program, producing one fresh, fully linked graph.
///
/// Every call allocates new nodes; no two executions share state. Binding
/// steps become pending bindings on their owning node — resolution is a
/// separate pass over the live graph ([`resolve_bindings`]).
pub fn execute(program: &Program, root_data: Option<DataRef>) -> NodeRef {
    let mut stack: Vec<NodeRef> = Vec::new();
    let mut finished: Option<NodeRef> = None;
    for step in program.steps() {
        match step {
            Step::CreateNode(class) => stack.push(Node::new(Arc::clone(class))),
            Step::SetLiteral { property, value } => {
                if let Some(top) = stack.last() {
                    top.borrow_mut().properties.insert(property.clone(), value.to_value());
                }
            }
            Step::RegisterBinding { property, expression, two_way } => {
                if let Some(top) = stack.last() {
                    let source = MemberRef::node_property(top, property);
                    let binding = Binding::new(source, expression.clone(), *two_way);
                    top.borrow_mut().bindings.push(Rc::new(RefCell::new(binding)));
                }
            }
            Step::RegisterName(name) => {
                if let Some(top) = stack.last() {
                    top.borrow_mut().name = Some(name.clone());
                }
            }
            Step::AttachChild => {
                let child = stack.pop();
                if let (Some(child), Some(parent)) = (child, stack.last()) {
                    child.borrow_mut().parent = Some(Rc::downgrade(parent));
                    parent.borrow_mut().children.push(child);
                }
            }
            Step::PopScope => finished = stack.pop(),
        }
    }
    // The compiler always terminates a program with PopScope.
    let root = finished.expect("compiled program terminates with PopScope");
    root.borrow_mut().data_source = root_data;
    root
}

/// Find `name` on this node or any descendant, depth first in child order.
pub fn find_by_name(node: &NodeRef, name: &str) -> Option<NodeRef> {
    if node.borrow().name.as_deref() == Some(name) {
        return Some(Rc::clone(node));
    }
    let children = node.borrow().children.clone();
    children.iter().find_map(|child| find_by_name(child, name))
}

pub fn logical_parent(node: &NodeRef) -> Option<NodeRef> {
    node.borrow().parent.as_ref().and_then(Weak::upgrade)
}

/// Topmost logical ancestor; the starting point of absolute binding paths.
pub fn root_of(node: &NodeRef) -> NodeRef {
    let mut current = Rc::clone(node);
    while let Some(parent) = logical_parent(&current) {
        current = parent;
    }
    current
}

/// Attach `child` under `parent` and re-resolve pending bindings from the
/// graph root — an attached subtree may satisfy named lookups anywhere.
pub fn attach_child(parent: &NodeRef, child: &NodeRef) -> Result<(), BindingError> {
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().children.push(Rc::clone(child));
    log::trace!(
        "attached `{}` under `{}`",
        child.borrow().class.name,
        parent.borrow().class.name
    );
    resolve_bindings(&root_of(parent), &BindingOptions::default())?;
    Ok(())
}

/// Detach `child` from `parent`, resetting every binding in the detached
/// subtree. Returns `false` when `child` was not a child of `parent`.
pub fn detach_child(parent: &NodeRef, child: &NodeRef) -> bool {
    {
        let mut p = parent.borrow_mut();
        let before = p.children.len();
        p.children.retain(|c| !Rc::ptr_eq(c, child));
        if p.children.len() == before {
            return false;
        }
    }
    child.borrow_mut().parent = None;
    reset_bindings(child);
    true
}

/// Replace the node's data source and re-resolve the subtree's bindings.
///
/// Bindings outside the subtree whose paths end at this node re-resolve on
/// the next explicit [`resolve_bindings`] pass.
pub fn set_data_source(node: &NodeRef, data: Option<DataRef>) -> Result<(), BindingError> {
    node.borrow_mut().data_source = data;
    reset_bindings(node);
    resolve_bindings(node, &BindingOptions::default())?;
    Ok(())
}

pub fn get_property(node: &NodeRef, name: &str) -> Option<Value> {
    node.borrow().properties.get(name).cloned()
}

/// Write a node property, firing the node's change hub. Writing the value
/// a property already holds is a silent no-op; that guard is what keeps
/// two-way propagation from ping-ponging.
pub fn set_property(node: &NodeRef, name: &str, value: Value) -> Result<(), ReflectError> {
    let hub = {
        let mut n = node.borrow_mut();
        let spec = n.class.spec(name).ok_or_else(|| ReflectError::NotFound {
            type_name: n.class.name.clone(),
            member: name.to_string(),
        })?;
        if !spec.flags.contains(PropertyFlags::WRITABLE) {
            return Err(ReflectError::NotWritable {
                type_name: n.class.name.clone(),
                member: name.to_string(),
            });
        }
        if !spec.kind.accepts(&value) {
            return Err(ReflectError::TypeMismatch {
                type_name: n.class.name.clone(),
                member: name.to_string(),
                expected: spec.kind,
            });
        }
        if n.properties.get(name) == Some(&value) {
            return Ok(());
        }
        n.properties.insert(name.to_string(), value.clone());
        Rc::clone(&n.hub)
    };
    hub.notify(name, &value);
    Ok(())
}

/// Register an additional binding on a node (reciprocal two-way links, or
/// bindings created in code rather than markup).
pub fn add_binding(node: &NodeRef, binding: BindingRef) {
    node.borrow_mut().bindings.push(binding);
}

pub(crate) fn remove_binding(node: &NodeRef, binding: &BindingRef) {
    node.borrow_mut().bindings.retain(|b| !Rc::ptr_eq(b, binding));
}

/// Resolve every pending binding in the subtree. Already-resolved bindings
/// with live targets are untouched; stale ones re-resolve. Returns how
/// many bindings became resolved. Only usage errors propagate.
pub fn resolve_bindings(
    scope: &NodeRef,
    options: &BindingOptions,
) -> Result<usize, BindingError> {
    let mut resolved = 0;
    let bindings = scope.borrow().bindings.clone();
    for b in bindings {
        if b.borrow().is_reciprocal() {
            continue;
        }
        let was_resolved = b.borrow().is_resolved();
        if binding::resolve(&b, scope, options)? && !was_resolved {
            resolved += 1;
        }
    }
    let children = scope.borrow().children.clone();
    for child in &children {
        resolved += resolve_bindings(child, options)?;
    }
    Ok(resolved)
}

/// Unconditionally reset every binding in the subtree. Reciprocal links
/// are derived state and are dropped outright; their originals re-register
/// them on the next successful resolve.
pub fn reset_bindings(scope: &NodeRef) {
    let bindings = scope.borrow().bindings.clone();
    for b in &bindings {
        b.borrow_mut().reset();
    }
    scope.borrow_mut().bindings.retain(|b| !b.borrow().is_reciprocal());
    let children = scope.borrow().children.clone();
    for child in &children {
        reset_bindings(child);
    }
}
