//! Process-wide property reflection table.
//!
//! Types are registered once with a builder closure; descriptor sets are
//! built lazily on the first lookup and cached immutably, keyed by
//! `TypeId` with a secondary name index for template type selectors.
//! Lookups are safe from any thread; a population race costs a duplicate
//! build, never corruption.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::value::{Value, ValueKind};
use super::{
    Accessor, DataObject, Getter, PropertyDescriptor, PropertyFlags, ReflectError, Setter,
    TypeDescriptor,
};

type BuilderFn = Box<dyn Fn() -> TypeDescriptor + Send + Sync>;

struct Registration {
    name: &'static str,
    builder: BuilderFn,
}

static REGISTRY: Lazy<RwLock<HashMap<TypeId, Registration>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
static TABLE: Lazy<RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
static NAME_INDEX: Lazy<RwLock<HashMap<&'static str, TypeId>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Declares the members of `T` during [`register`].
pub struct TypeBuilder<T> {
    properties: Vec<(String, ValueKind, PropertyFlags, Option<Getter>, Option<Setter>)>,
    accessors: Vec<(String, Accessor)>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: 'static> TypeBuilder<T> {
    fn new() -> Self {
        TypeBuilder { properties: Vec::new(), accessors: Vec::new(), _marker: PhantomData }
    }

    pub fn read_only(
        &mut self,
        name: &str,
        kind: ValueKind,
        getter: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.properties.push((
            name.to_string(),
            kind,
            PropertyFlags::read_only(),
            Some(wrap_getter(getter)),
            None,
        ));
        self
    }

    pub fn read_write(
        &mut self,
        name: &str,
        kind: ValueKind,
        getter: impl Fn(&T) -> Value + Send + Sync + 'static,
        setter: impl Fn(&T, &Value) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.properties.push((
            name.to_string(),
            kind,
            PropertyFlags::read_write(),
            Some(wrap_getter(getter)),
            Some(Arc::new(move |any: &dyn std::any::Any, value: &Value| {
                any.downcast_ref::<T>().map_or(false, |t| setter(t, value))
            })),
        ));
        self
    }

    /// A zero-argument accessor, resolvable by item-template fetch paths
    /// ahead of properties of the same name.
    pub fn accessor(
        &mut self,
        name: &str,
        accessor: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.accessors.push((name.to_string(), wrap_getter(accessor)));
        self
    }
}

fn wrap_getter<T: 'static>(getter: impl Fn(&T) -> Value + Send + Sync + 'static) -> Getter {
    Arc::new(move |any: &dyn std::any::Any| {
        any.downcast_ref::<T>().map(&getter).unwrap_or(Value::Null)
    })
}

/// Register `T` under `name`. Re-registering replaces the previous entry
/// and drops any cached descriptor set.
pub fn register<T: 'static>(
    name: &'static str,
    build: impl Fn(&mut TypeBuilder<T>) + Send + Sync + 'static,
) {
    let type_id = TypeId::of::<T>();
    let builder: BuilderFn = Box::new(move || {
        let mut b = TypeBuilder::<T>::new();
        build(&mut b);
        let mut properties = indexmap::IndexMap::new();
        for (pname, kind, flags, getter, setter) in b.properties {
            let descriptor = PropertyDescriptor::new(pname.clone(), kind, flags, getter, setter);
            properties.insert(pname, Arc::new(descriptor));
        }
        let mut accessors = indexmap::IndexMap::new();
        for (aname, accessor) in b.accessors {
            accessors.insert(aname, accessor);
        }
        TypeDescriptor { type_name: name, properties, accessors }
    });
    REGISTRY.write().insert(type_id, Registration { name, builder });
    NAME_INDEX.write().insert(name, type_id);
    TABLE.write().remove(&type_id);
}

/// Descriptor set for a type id; built on first request, cache hit after.
pub fn descriptor_set(type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
    if let Some(set) = TABLE.read().get(&type_id) {
        return Some(Arc::clone(set));
    }
    let built = {
        let registry = REGISTRY.read();
        let registration = registry.get(&type_id)?;
        Arc::new((registration.builder)())
    };
    TABLE.write().insert(type_id, Arc::clone(&built));
    log::trace!("reflect: built descriptor set for `{}`", built.type_name);
    Some(built)
}

/// Descriptor set for a live object's runtime type.
pub fn descriptor_set_of(object: &dyn DataObject) -> Option<Arc<TypeDescriptor>> {
    descriptor_set(object.as_any().type_id())
}

/// Descriptor set by registered type name (template type selectors).
pub fn descriptor_set_by_name(name: &str) -> Option<Arc<TypeDescriptor>> {
    let type_id = *NAME_INDEX.read().get(name)?;
    descriptor_set(type_id)
}

/// `DescriptorFor(type, name)`: the property descriptor for one member of
/// `object`'s runtime type, or `NotFound`.
pub fn descriptor_for(
    object: &dyn DataObject,
    member: &str,
) -> Result<Arc<PropertyDescriptor>, ReflectError> {
    descriptor_set_of(object)
        .and_then(|set| set.property(member).cloned())
        .ok_or_else(|| ReflectError::NotFound {
            type_name: object.type_name().to_string(),
            member: member.to_string(),
        })
}
