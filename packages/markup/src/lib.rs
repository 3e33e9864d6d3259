//! Markup instantiation and binding core.
//!
//! Markup text is parsed into an abstract tree, compiled once into an
//! immutable, shareable instantiation [`Program`], and executed any number
//! of times to stamp out independent live graphs. Binding expressions
//! declared in the markup resolve lazily against each live graph, with
//! one-way and two-way change propagation; item templates expand
//! hierarchical collection data on demand.
//!
//! ```text
//! markup text -> parse -> compile -> cached Program -> execute -> live graph
//!                                                      resolve_bindings
//!                                                      ItemTemplate expansion
//! ```
//!
//! Compilation is `Send + Sync` end to end and may run on background
//! threads; live graphs are single-threaded by construction (`Rc`-owned).

pub mod binding;
pub mod graph;
pub mod markup;
pub mod parse_util;
pub mod program;
pub mod reflect;
pub mod registry;
pub mod template;

pub use binding::{Binding, BindingError, BindingOptions, Member, MemberRef, TargetRef};
pub use graph::{
    attach_child, detach_child, execute, find_by_name, get_property, logical_parent,
    reset_bindings, resolve_bindings, root_of, set_data_source, set_property, Node, NodeRef,
    WeakNodeRef,
};
pub use markup::{parse, AttrValue, Attribute, Element};
pub use parse_util::{ParseError, ParseLocation, ParseSourceSpan};
pub use program::{compile, CompileError, Program, ProgramCache, Step};
pub use reflect::{
    ChangeHub, DataObject, DataRef, Literal, PropertyDescriptor, PropertyFlags, ReflectError,
    TypeDescriptor, Value, ValueKind,
};
pub use registry::{ChildMode, PropertySpec, WidgetClass, WidgetRegistry};
pub use template::{
    CountProc, ExpandProc, FetchPath, ItemTemplate, TemplateError, TemplateSet,
};
