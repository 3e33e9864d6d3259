//! Binding expressions: path strings resolved against a live graph into
//! (object, property) references, with one-way and two-way propagation.
//!
//! Resolution failure is a steady state, not an error: a binding whose
//! path does not reach a live target stays pending and is retried on the
//! next trigger (data-source change, attach, explicit resolve pass). Only
//! genuine markup defects fail fast with [`BindingError`].

use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use thiserror::Error;

use crate::graph::{self, BindingRef, NodeRef, WeakNodeRef};
use crate::reflect::{self, DataRef, ListenerId, PropertyDescriptor, Value, WeakDataRef};

/// A non-owning handle to a binding's endpoint object.
#[derive(Clone)]
pub enum TargetRef {
    Node(WeakNodeRef),
    Data(WeakDataRef),
}

impl TargetRef {
    pub fn is_alive(&self) -> bool {
        match self {
            TargetRef::Node(w) => w.strong_count() > 0,
            TargetRef::Data(w) => w.strong_count() > 0,
        }
    }

    pub fn upgrade_node(&self) -> Option<NodeRef> {
        match self {
            TargetRef::Node(w) => w.upgrade(),
            TargetRef::Data(_) => None,
        }
    }

    pub fn upgrade_data(&self) -> Option<DataRef> {
        match self {
            TargetRef::Data(w) => w.upgrade(),
            TargetRef::Node(_) => None,
        }
    }
}

#[derive(Clone)]
pub enum Member {
    /// A property on a live node, validated against its class.
    NodeProperty(String),
    /// A property on a data object, resolved through the reflection table.
    DataProperty(Arc<PropertyDescriptor>),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::NodeProperty(name) => name,
            Member::DataProperty(descriptor) => &descriptor.name,
        }
    }
}

/// (object, property descriptor) pair — valid only while the object lives.
/// `member == None` references the object itself (empty-expression
/// bindings to a whole data source).
#[derive(Clone)]
pub struct MemberRef {
    pub target: TargetRef,
    pub member: Option<Member>,
}

impl MemberRef {
    pub fn node_property(node: &NodeRef, property: &str) -> Self {
        MemberRef {
            target: TargetRef::Node(Rc::downgrade(node)),
            member: Some(Member::NodeProperty(property.to_string())),
        }
    }

    pub fn data_property(object: &DataRef, descriptor: Arc<PropertyDescriptor>) -> Self {
        MemberRef {
            target: TargetRef::Data(Rc::downgrade(object)),
            member: Some(Member::DataProperty(descriptor)),
        }
    }

    pub fn data_object(object: &DataRef) -> Self {
        MemberRef { target: TargetRef::Data(Rc::downgrade(object)), member: None }
    }

    pub fn is_alive(&self) -> bool {
        self.target.is_alive()
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member.as_ref().map(Member::name)
    }

    pub fn read(&self) -> Option<Value> {
        match (&self.target, &self.member) {
            (TargetRef::Node(w), Some(Member::NodeProperty(p))) => {
                w.upgrade().and_then(|n| graph::get_property(&n, p))
            }
            (TargetRef::Data(w), Some(Member::DataProperty(d))) => {
                w.upgrade().and_then(|o| d.read(&*o).ok())
            }
            (TargetRef::Data(w), None) => w.upgrade().map(Value::Object),
            _ => None,
        }
    }

    /// Write through the reference; a dead object or refused write is
    /// traced and swallowed, matching the silent retry protocol.
    pub fn write(&self, value: &Value) -> bool {
        match (&self.target, &self.member) {
            (TargetRef::Node(w), Some(Member::NodeProperty(p))) => match w.upgrade() {
                Some(n) => match graph::set_property(&n, p, value.clone()) {
                    Ok(()) => true,
                    Err(e) => {
                        log::trace!("binding write refused: {e}");
                        false
                    }
                },
                None => false,
            },
            (TargetRef::Data(w), Some(Member::DataProperty(d))) => match w.upgrade() {
                Some(o) => match d.write(&*o, value) {
                    Ok(()) => true,
                    Err(e) => {
                        log::trace!("binding write refused: {e}");
                        false
                    }
                },
                None => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            TargetRef::Node(_) => "node",
            TargetRef::Data(_) => "data",
        };
        write!(f, "MemberRef({target}.{})", self.member_name().unwrap_or("<self>"))
    }
}

/// Defects in the markup itself; fatal, unlike ordinary lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("`.` segment is only valid in first position: `{expression}`")]
    DotNotFirst { expression: String },
    #[error("expected `member` or `name.member` as final segment: `{expression}`")]
    MalformedSegment { expression: String },
    #[error("`{type_name}` does not advertise change propagation, required for two-way binding")]
    NotBindable { type_name: String },
}

#[derive(Debug, Clone, Copy)]
pub struct BindingOptions {
    /// When set (the default), a two-way binding whose target cannot
    /// propagate changes fails fast instead of degrading to one-way.
    pub strict_two_way: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        BindingOptions { strict_two_way: true }
    }
}

enum SubscriptionOwner {
    Node(WeakNodeRef),
    Data(WeakDataRef),
}

struct Subscription {
    owner: SubscriptionOwner,
    id: ListenerId,
}

impl Subscription {
    fn cancel(self) {
        match self.owner {
            SubscriptionOwner::Node(w) => {
                if let Some(node) = w.upgrade() {
                    node.borrow().hub().unsubscribe(self.id);
                }
            }
            SubscriptionOwner::Data(w) => {
                if let Some(object) = w.upgrade() {
                    if let Some(hub) = object.changes() {
                        hub.unsubscribe(self.id);
                    }
                }
            }
        }
    }
}

/// A pending or resolved link from a source property to a target member.
///
/// `source` is fixed at creation; `target` may be cleared and re-resolved
/// any number of times without recreating the binding.
pub struct Binding {
    source: MemberRef,
    expression: String,
    two_way: bool,
    target: Option<MemberRef>,
    resolved: bool,
    reciprocal_link: bool,
    subscription: Option<Subscription>,
    reverse_subscription: Option<Subscription>,
    /// The reciprocal registered on a two-way target node, so a reset here
    /// tears it down there.
    reciprocal: Option<(WeakNodeRef, Weak<RefCell<Binding>>)>,
}

impl Binding {
    pub fn new(source: MemberRef, expression: String, two_way: bool) -> Self {
        Binding {
            source,
            expression,
            two_way,
            target: None,
            resolved: false,
            reciprocal_link: false,
            subscription: None,
            reverse_subscription: None,
            reciprocal: None,
        }
    }

    fn new_reciprocal(source: MemberRef, target: MemberRef, subscription: Subscription) -> Self {
        Binding {
            source,
            expression: String::new(),
            two_way: false,
            target: Some(target),
            resolved: true,
            reciprocal_link: true,
            subscription: Some(subscription),
            reverse_subscription: None,
            reciprocal: None,
        }
    }

    pub fn source(&self) -> &MemberRef {
        &self.source
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn two_way(&self) -> bool {
        self.two_way
    }

    pub fn target(&self) -> Option<&MemberRef> {
        self.target.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn is_reciprocal(&self) -> bool {
        self.reciprocal_link
    }

    /// Clear `target` and `resolved` unconditionally, cancelling change
    /// subscriptions and any reciprocal link.
    pub fn reset(&mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.cancel();
        }
        if let Some(sub) = self.reverse_subscription.take() {
            sub.cancel();
        }
        if let Some((node_w, reciprocal_w)) = self.reciprocal.take() {
            if let Some(reciprocal) = reciprocal_w.upgrade() {
                reciprocal.borrow_mut().reset();
                if let Some(node) = node_w.upgrade() {
                    graph::remove_binding(&node, &reciprocal);
                }
            }
        }
        self.target = None;
        self.resolved = false;
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("expression", &self.expression)
            .field("two_way", &self.two_way)
            .field("resolved", &self.resolved)
            .field("reciprocal", &self.reciprocal_link)
            .finish()
    }
}

/// Resolve a binding's target by walking its expression from `context`.
///
/// Returns `Ok(true)` iff the binding is now resolved. `Ok(false)` is the
/// retryable steady state; `Err` only for markup defects.
pub fn resolve(
    binding: &BindingRef,
    context: &NodeRef,
    options: &BindingOptions,
) -> Result<bool, BindingError> {
    {
        let b = binding.borrow();
        if b.reciprocal_link {
            return Ok(b.resolved);
        }
        if b.resolved {
            if b.target.as_ref().map_or(false, MemberRef::is_alive) {
                return Ok(true);
            }
        }
    }
    // Stale target (object dropped out of the graph): start over.
    if binding.borrow().resolved {
        binding.borrow_mut().reset();
    }

    let (expression, two_way) = {
        let b = binding.borrow();
        (b.expression.clone(), b.two_way)
    };

    // Empty expression: the target is the context's data source itself.
    if expression.is_empty() {
        let Some(data) = context.borrow().data_source().cloned() else {
            log::trace!("binding `{{}}` pending: no data source");
            return Ok(false);
        };
        let target = MemberRef::data_object(&data);
        {
            let mut b = binding.borrow_mut();
            b.target = Some(target);
            b.resolved = true;
        }
        let source = binding.borrow().source.clone();
        source.write(&Value::Object(data));
        return Ok(true);
    }

    let segments: SmallVec<[&str; 8]> = expression.split('/').collect();
    let mut index = 0;
    let mut current: NodeRef = Rc::clone(context);
    if segments[0].is_empty() {
        // Leading `/`: start at the graph root instead of the context.
        current = graph::root_of(context);
        index = 1;
    }
    while index + 1 < segments.len() {
        current = match segments[index] {
            ".." => match graph::logical_parent(&current) {
                Some(parent) => parent,
                None => {
                    log::trace!("binding `{expression}` pending: no logical parent");
                    return Ok(false);
                }
            },
            "." => {
                if index != 0 {
                    return Err(BindingError::DotNotFirst { expression: expression.clone() });
                }
                Rc::clone(context)
            }
            name => match graph::find_by_name(&current, name) {
                Some(node) => node,
                None => {
                    log::trace!("binding `{expression}` pending: `{name}` not found");
                    return Ok(false);
                }
            },
        };
        index += 1;
    }

    let final_segment = segments[segments.len() - 1];
    let parts: SmallVec<[&str; 2]> = final_segment.split('.').collect();
    let target = match parts.as_slice() {
        [member] if !member.is_empty() => {
            // Plain member: resolved against the reached node's data source.
            let Some(data) = current.borrow().data_source().cloned() else {
                log::trace!("binding `{expression}` pending: no data source at target");
                return Ok(false);
            };
            let descriptor = match reflect::descriptor_for(&*data, member) {
                Ok(d) => d,
                Err(e) => {
                    log::trace!("binding `{expression}` pending: {e}");
                    return Ok(false);
                }
            };
            if !descriptor.readable() {
                log::trace!("binding `{expression}` pending: `{member}` not readable");
                return Ok(false);
            }
            MemberRef::data_property(&data, descriptor)
        }
        [name, member] if !name.is_empty() && !member.is_empty() => {
            // Qualified member: resolved against the named node itself.
            let Some(node) = graph::find_by_name(&current, name) else {
                log::trace!("binding `{expression}` pending: `{name}` not found");
                return Ok(false);
            };
            if node.borrow().class().spec(member).is_none() {
                log::trace!("binding `{expression}` pending: `{name}` has no `{member}`");
                return Ok(false);
            }
            MemberRef::node_property(&node, member)
        }
        _ => return Err(BindingError::MalformedSegment { expression: expression.clone() }),
    };

    install(binding, target, two_way, options)
}

fn install(
    binding: &BindingRef,
    target: MemberRef,
    two_way: bool,
    options: &BindingOptions,
) -> Result<bool, BindingError> {
    let source = binding.borrow().source.clone();

    // Two-way capability is checked first so a strict failure leaves no
    // half-installed subscription behind.
    let (reverse_subscription, reciprocal) = if two_way {
        register_reciprocal(&source, &target, options)?
    } else {
        (None, None)
    };
    let subscription = subscribe(&target, source.clone());

    {
        let mut b = binding.borrow_mut();
        b.target = Some(target.clone());
        b.resolved = true;
        b.subscription = subscription;
        b.reverse_subscription = reverse_subscription;
        b.reciprocal = reciprocal;
    }
    log::trace!("binding `{}` resolved", binding.borrow().expression);

    // Initial sync so the source property reflects the current value.
    if let Some(value) = target.read() {
        source.write(&value);
    }
    Ok(true)
}

/// Watch `watched` for changes and push them into `sink`. `None` when the
/// watched object advertises no change propagation (one-shot binding).
fn subscribe(watched: &MemberRef, sink: MemberRef) -> Option<Subscription> {
    let property = watched.member_name()?;
    match &watched.target {
        TargetRef::Node(w) => {
            let node = w.upgrade()?;
            let hub = node.borrow().hub();
            let id = hub.subscribe(Some(property), move |_, value| {
                sink.write(value);
            });
            Some(Subscription { owner: SubscriptionOwner::Node(w.clone()), id })
        }
        TargetRef::Data(w) => {
            let object = w.upgrade()?;
            let hub = object.changes()?;
            let id = hub.subscribe(Some(property), move |_, value| {
                sink.write(value);
            });
            Some(Subscription { owner: SubscriptionOwner::Data(w.clone()), id })
        }
    }
}

/// Wire the reverse direction of a two-way binding: watch the source and
/// push into the target. On a node target the reverse link is registered
/// as a reciprocal `Binding` on that node, as markup-declared bindings
/// are; on a data target only the subscription exists.
fn register_reciprocal(
    source: &MemberRef,
    target: &MemberRef,
    options: &BindingOptions,
) -> Result<(Option<Subscription>, Option<(WeakNodeRef, Weak<RefCell<Binding>>)>), BindingError> {
    let capable = match &target.target {
        TargetRef::Node(_) => true,
        TargetRef::Data(w) => match w.upgrade() {
            Some(object) => {
                let writable = match &target.member {
                    Some(Member::DataProperty(d)) => d.writable(),
                    _ => false,
                };
                object.changes().is_some() && writable
            }
            None => false,
        },
    };
    if !capable {
        let type_name = target
            .target
            .upgrade_data()
            .map(|o| o.type_name().to_string())
            .unwrap_or_else(|| "<dropped>".to_string());
        if options.strict_two_way {
            return Err(BindingError::NotBindable { type_name });
        }
        log::debug!("two-way binding degraded to one-way: `{type_name}` not bindable");
        return Ok((None, None));
    }

    let Some(reverse) = subscribe(source, target.clone()) else {
        return Ok((None, None));
    };

    match target.target.upgrade_node() {
        Some(target_node) => {
            let reciprocal = Rc::new(RefCell::new(Binding::new_reciprocal(
                target.clone(),
                source.clone(),
                reverse,
            )));
            graph::add_binding(&target_node, Rc::clone(&reciprocal));
            Ok((None, Some((Rc::downgrade(&target_node), Rc::downgrade(&reciprocal)))))
        }
        None => Ok((Some(reverse), None)),
    }
}
