//! Per-object change notification.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::value::Value;

pub type ListenerId = u64;

type Callback = Rc<dyn Fn(&str, &Value)>;

struct Listener {
    id: ListenerId,
    /// `None` listens to every property of the object.
    property: Option<String>,
    callback: Callback,
}

/// Listener registry embedded in live nodes and in data-source objects that
/// advertise change propagation. Single-threaded, like the graph it serves.
#[derive(Default)]
pub struct ChangeHub {
    next_id: Cell<ListenerId>,
    listeners: RefCell<Vec<Listener>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        ChangeHub::default()
    }

    pub fn subscribe(
        &self,
        property: Option<&str>,
        callback: impl Fn(&str, &Value) + 'static,
    ) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push(Listener {
            id,
            property: property.map(str::to_string),
            callback: Rc::new(callback),
        });
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Invoke every listener registered for `property`. The listener list
    /// is snapshotted first: callbacks may subscribe, unsubscribe, or write
    /// properties that notify this same hub.
    pub fn notify(&self, property: &str, value: &Value) {
        let snapshot: Vec<Callback> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.property.as_deref().map_or(true, |p| p == property))
            .map(|l| Rc::clone(&l.callback))
            .collect();
        for callback in snapshot {
            callback(property, value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl fmt::Debug for ChangeHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHub")
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}
