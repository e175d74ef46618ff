//! Change listener registry
//!
//! Listeners are identified by their `Arc` allocation: registering the same
//! `Arc` twice returns the existing handle instead of adding a second entry.
//! Notification order is registration order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Shared listener callback
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Token returned by registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

pub struct ListenerRegistry<T: ?Sized> {
    next_id: u64,
    entries: BTreeMap<u64, Listener<T>>,
    by_identity: HashMap<usize, u64>,
}

impl<T: ?Sized> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            by_identity: HashMap::new(),
        }
    }
}

impl<T: ?Sized> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Listener<T>) -> ListenerHandle {
        let identity = identity(&listener);
        if let Some(id) = self.by_identity.get(&identity) {
            return ListenerHandle(*id);
        }
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(id, listener);
        self.by_identity.insert(identity, id);
        ListenerHandle(id)
    }

    /// Remove one registration; false if the handle was already removed
    pub fn remove(&mut self, handle: &ListenerHandle) -> bool {
        match self.entries.remove(&handle.0) {
            Some(listener) => {
                self.by_identity.remove(&identity(&listener));
                true
            }
            None => false,
        }
    }

    pub fn notify(&self, payload: &T) {
        for listener in self.entries.values() {
            listener(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn identity<T: ?Sized>(listener: &Listener<T>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}
