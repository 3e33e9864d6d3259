//! Property reflection: the capability seam that lets the compiler and the
//! binding resolver operate on the live type of any runtime object without
//! this crate knowing concrete widget or data types in advance.
//!
//! Descriptors are dispatch closures keyed by `(runtime type, member name)`
//! and cached process-wide; see [`table`].

pub mod hub;
pub mod table;
pub mod value;

pub use hub::{ChangeHub, ListenerId};
pub use table::{
    descriptor_for, descriptor_set, descriptor_set_by_name, descriptor_set_of, register,
    TypeBuilder,
};
pub use value::{Literal, Value, ValueKind};

use bitflags::bitflags;
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// The arbitrary external object a node's bindings read from.
///
/// Mutability is the object's own business (interior mutability on the UI
/// thread); the reflection layer only ever sees `&dyn DataObject`.
pub trait DataObject: Any {
    fn as_any(&self) -> &dyn Any;

    /// The name this object's type was registered under, used for template
    /// type selection.
    fn type_name(&self) -> &'static str;

    /// Change-propagation capability. Required of two-way binding targets;
    /// one-way targets without it resolve but never push updates.
    fn changes(&self) -> Option<&ChangeHub> {
        None
    }

    /// Collection view used by count procedures.
    fn item_count(&self) -> Option<usize> {
        None
    }
}

pub type DataRef = Rc<dyn DataObject>;
pub type WeakDataRef = std::rc::Weak<dyn DataObject>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    #[error("`{type_name}` has no member `{member}`")]
    NotFound { type_name: String, member: String },
    #[error("member `{member}` of `{type_name}` is not readable")]
    NotReadable { type_name: String, member: String },
    #[error("member `{member}` of `{type_name}` is not writable")]
    NotWritable { type_name: String, member: String },
    #[error("member `{member}` of `{type_name}` expects {expected:?}")]
    TypeMismatch { type_name: String, member: String, expected: ValueKind },
    #[error("no type registered under `{name}`")]
    UnknownType { name: String },
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u8 {
        const READABLE  = 1 << 0;
        const WRITABLE  = 1 << 1;
        /// Writes are announced on the owner's [`ChangeHub`].
        const NOTIFYING = 1 << 2;
    }
}

impl PropertyFlags {
    pub fn read_only() -> Self {
        PropertyFlags::READABLE
    }

    pub fn read_write() -> Self {
        PropertyFlags::READABLE | PropertyFlags::WRITABLE | PropertyFlags::NOTIFYING
    }
}

pub type Getter = Arc<dyn Fn(&dyn Any) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&dyn Any, &Value) -> bool + Send + Sync>;
/// Zero-argument accessor used by item-template fetch paths.
pub type Accessor = Arc<dyn Fn(&dyn Any) -> Value + Send + Sync>;

/// The capability bundle for one `(type, name)` pair: read, write, and
/// change-notify. Unique per pair, immutable once built.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: ValueKind,
    pub flags: PropertyFlags,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl PropertyDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: ValueKind,
        flags: PropertyFlags,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Self {
        PropertyDescriptor { name: name.into(), kind, flags, getter, setter }
    }

    pub fn readable(&self) -> bool {
        self.flags.contains(PropertyFlags::READABLE) && self.getter.is_some()
    }

    pub fn writable(&self) -> bool {
        self.flags.contains(PropertyFlags::WRITABLE) && self.setter.is_some()
    }

    /// Whether writes through this descriptor can be observed on `object`.
    pub fn notifying(&self, object: &dyn DataObject) -> bool {
        self.flags.contains(PropertyFlags::NOTIFYING) && object.changes().is_some()
    }

    pub fn read(&self, object: &dyn DataObject) -> Result<Value, ReflectError> {
        match &self.getter {
            Some(get) if self.flags.contains(PropertyFlags::READABLE) => Ok(get(object.as_any())),
            _ => Err(ReflectError::NotReadable {
                type_name: object.type_name().to_string(),
                member: self.name.clone(),
            }),
        }
    }

    pub fn write(&self, object: &dyn DataObject, value: &Value) -> Result<(), ReflectError> {
        let set = match &self.setter {
            Some(set) if self.flags.contains(PropertyFlags::WRITABLE) => set,
            _ => {
                return Err(ReflectError::NotWritable {
                    type_name: object.type_name().to_string(),
                    member: self.name.clone(),
                })
            }
        };
        if !self.kind.accepts(value) {
            return Err(ReflectError::TypeMismatch {
                type_name: object.type_name().to_string(),
                member: self.name.clone(),
                expected: self.kind,
            });
        }
        if set(object.as_any(), value) {
            if let Some(hub) = object.changes() {
                if self.flags.contains(PropertyFlags::NOTIFYING) {
                    hub.notify(&self.name, value);
                }
            }
            Ok(())
        } else {
            Err(ReflectError::TypeMismatch {
                type_name: object.type_name().to_string(),
                member: self.name.clone(),
                expected: self.kind,
            })
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Everything the reflection table knows about one registered type:
/// property descriptors plus the zero-argument accessors fetch paths use.
pub struct TypeDescriptor {
    pub type_name: &'static str,
    pub properties: IndexMap<String, Arc<PropertyDescriptor>>,
    pub accessors: IndexMap<String, Accessor>,
}

impl TypeDescriptor {
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.properties.get(name)
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("accessors", &self.accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}
