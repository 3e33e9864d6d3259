//! Item templates: lazy, idempotent expansion of hierarchical data into
//! display nodes.
//!
//! A template is a compiled program plus a data-fetch path and an optional
//! type selector. Expansion is bound to one host node and materializes the
//! host's collection at most once, no matter how often the trigger fires.

use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

use crate::graph::{self, NodeRef, WeakNodeRef};
use crate::markup::parse;
use crate::program::{compile, CompileError, Program};
use crate::reflect::{self, DataRef, ReflectError, Value};
use crate::registry::WidgetRegistry;

/// Fixed name of the host's list-display descendant.
pub const LIST_SLOT: &str = "List";
/// Property on the list-display node that receives the fetched sub-data.
pub const DATA_PROPERTY: &str = "Data";
/// Catalogue key for templates without a type selector.
pub const DEFAULT_SELECTOR: &str = "default";

/// How a template obtains sub-data from a host's data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPath {
    /// The literal `self`: the data source object, unmodified. Supports
    /// recursive self-similar hierarchies.
    SelfData,
    /// A zero-argument accessor or readable property on the data source's
    /// runtime type (accessor wins when both exist).
    Member(String),
}

impl FetchPath {
    pub fn parse(path: &str) -> FetchPath {
        if path == "self" {
            FetchPath::SelfData
        } else {
            FetchPath::Member(path.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("fetch member `{member}` not found on `{type_name}`")]
    UnknownFetchMember { type_name: String, member: String },
    #[error("host has no descendant named `List`")]
    MissingListSlot,
    #[error("cannot assign fetched data: {0}")]
    DataAssignment(ReflectError),
}

pub type ExpandProc = Box<dyn Fn() -> Result<(), TemplateError>>;
pub type CountProc = Box<dyn Fn(&NodeRef) -> bool>;

#[derive(Debug)]
pub struct ItemTemplate {
    program: Arc<Program>,
    data_type: Option<String>,
    fetch: FetchPath,
}

impl ItemTemplate {
    /// Compile template markup plus its fetch path. When a type selector is
    /// given and that type is registered, the fetch member is validated
    /// here; an unregistered selector falls back to dynamic lookup at
    /// expansion time.
    pub fn compile(
        source: &str,
        registry: &WidgetRegistry,
        data_type: Option<&str>,
        fetch_path: &str,
    ) -> Result<ItemTemplate, TemplateError> {
        let root = parse(source).map_err(CompileError::from)?;
        let program = Arc::new(compile(&root, registry)?);
        let fetch = FetchPath::parse(fetch_path);
        if let (Some(type_name), FetchPath::Member(member)) = (data_type, &fetch) {
            if let Some(set) = reflect::descriptor_set_by_name(type_name) {
                let found = set.accessor(member).is_some()
                    || set.property(member).map_or(false, |d| d.readable());
                if !found {
                    return Err(TemplateError::UnknownFetchMember {
                        type_name: type_name.to_string(),
                        member: member.clone(),
                    });
                }
            }
        }
        Ok(ItemTemplate { program, data_type: data_type.map(str::to_string), fetch })
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    pub fn fetch(&self) -> &FetchPath {
        &self.fetch
    }

    /// Stamp out one item graph from the template's program.
    pub fn instantiate(&self, data: Option<DataRef>) -> NodeRef {
        graph::execute(&self.program, data)
    }

    /// Evaluate the fetch path against `data` without mutating anything.
    fn fetch_value(&self, data: &DataRef) -> Result<Value, TemplateError> {
        let member = match &self.fetch {
            FetchPath::SelfData => return Ok(Value::Object(Rc::clone(data))),
            FetchPath::Member(member) => member,
        };
        let set = self
            .data_type
            .as_deref()
            .and_then(reflect::descriptor_set_by_name)
            .or_else(|| reflect::descriptor_set_of(&**data))
            .ok_or_else(|| TemplateError::UnknownFetchMember {
                type_name: data.type_name().to_string(),
                member: member.clone(),
            })?;
        if let Some(accessor) = set.accessor(member) {
            return Ok(accessor(data.as_any()));
        }
        if let Some(descriptor) = set.property(member) {
            if descriptor.readable() {
                return Ok(descriptor.read(&**data).unwrap_or(Value::Null));
            }
        }
        Err(TemplateError::UnknownFetchMember {
            type_name: set.type_name.to_string(),
            member: member.clone(),
        })
    }

    /// The expansion procedure bound to `host`.
    ///
    /// Invoking it locates the host's `List` descendant; if that node's
    /// `Data` is already set the call is a no-op. Otherwise the host's
    /// template catalogue is propagated to the descendant (nested
    /// expansions reuse it) and the fetched sub-data is assigned to the
    /// descendant's `Data`, which triggers its own population logic.
    pub fn bind_expansion(self: &Rc<Self>, host: &NodeRef) -> ExpandProc {
        let template = Rc::clone(self);
        let host: WeakNodeRef = Rc::downgrade(host);
        Box::new(move || {
            let Some(host) = host.upgrade() else {
                return Ok(());
            };
            let Some(list) = graph::find_by_name(&host, LIST_SLOT) else {
                return Err(TemplateError::MissingListSlot);
            };
            if graph::get_property(&list, DATA_PROPERTY).map_or(false, |v| !v.is_null()) {
                log::trace!("expansion skipped: `{LIST_SLOT}` already populated");
                return Ok(());
            }
            let templates = host.borrow().templates().cloned();
            if let Some(templates) = templates {
                list.borrow_mut().set_templates(templates);
            }
            let Some(data) = host.borrow().data_source().cloned() else {
                log::trace!("expansion skipped: host has no data source");
                return Ok(());
            };
            let sub_data = template.fetch_value(&data)?;
            graph::set_property(&list, DATA_PROPERTY, sub_data)
                .map_err(TemplateError::DataAssignment)?;
            Ok(())
        })
    }

    /// The companion count procedure: same fetch, no mutation, reports
    /// whether the fetched collection has any elements.
    pub fn count_proc(self: &Rc<Self>) -> CountProc {
        let template = Rc::clone(self);
        Box::new(move |node: &NodeRef| {
            let Some(data) = node.borrow().data_source().cloned() else {
                return false;
            };
            match template.fetch_value(&data) {
                Ok(value) => value.count().map_or(false, |count| count > 0),
                Err(e) => {
                    log::debug!("count procedure failed: {e}");
                    false
                }
            }
        })
    }
}

/// Shared, immutable-after-construction template catalogue, selected by
/// data-type name with a `"default"` fallback.
#[derive(Debug)]
pub struct TemplateSet {
    templates: IndexMap<String, Rc<ItemTemplate>>,
}

impl TemplateSet {
    pub fn build(templates: impl IntoIterator<Item = Rc<ItemTemplate>>) -> Rc<TemplateSet> {
        let mut map = IndexMap::new();
        for template in templates {
            let key =
                template.data_type.clone().unwrap_or_else(|| DEFAULT_SELECTOR.to_string());
            map.insert(key, template);
        }
        Rc::new(TemplateSet { templates: map })
    }

    pub fn select(&self, type_name: &str) -> Option<&Rc<ItemTemplate>> {
        self.templates.get(type_name).or_else(|| self.templates.get(DEFAULT_SELECTOR))
    }

    pub fn select_for(&self, data: &DataRef) -> Option<&Rc<ItemTemplate>> {
        self.select(data.type_name())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
