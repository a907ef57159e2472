//! Handler bookkeeping for the event engine.

use std::collections::HashMap;
use std::sync::Arc;

use super::Handler;

/// Type-scoped and general handler lists.
///
/// Invariant: a handler appears at most once per type-scoped list and at
/// most once in the general list (compared by `Arc` pointer).
#[derive(Default)]
pub struct HandlerRegistry {
    by_type: HashMap<String, Vec<Handler>>,
    general: Vec<Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handler` for `event_type`. Returns `false` if it was already there.
    pub fn register(&mut self, event_type: &str, handler: Handler) -> bool {
        let list = self.by_type.entry(event_type.to_string()).or_default();
        push_unique(list, handler)
    }

    /// Remove `handler` from `event_type`. Returns `false` if it was absent.
    ///
    /// A type whose list becomes empty is dropped from the map.
    pub fn unregister(&mut self, event_type: &str, handler: &Handler) -> bool {
        let Some(list) = self.by_type.get_mut(event_type) else {
            return false;
        };
        let removed = remove_ptr(list, handler);
        if list.is_empty() {
            self.by_type.remove(event_type);
        }
        removed
    }

    pub fn register_general(&mut self, handler: Handler) -> bool {
        push_unique(&mut self.general, handler)
    }

    pub fn unregister_general(&mut self, handler: &Handler) -> bool {
        remove_ptr(&mut self.general, handler)
    }

    /// Handlers to invoke for one event: type-scoped first, then general,
    /// each in registration order.
    pub fn snapshot(&self, event_type: &str) -> Vec<Handler> {
        let scoped = self.by_type.get(event_type).map(Vec::as_slice).unwrap_or_default();
        scoped.iter().chain(self.general.iter()).cloned().collect()
    }

    /// Number of handlers registered for `event_type` (general ones excluded).
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.by_type.get(event_type).map_or(0, Vec::len)
    }

    pub fn general_count(&self) -> usize {
        self.general.len()
    }
}

fn push_unique(list: &mut Vec<Handler>, handler: Handler) -> bool {
    if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
        return false;
    }
    list.push(handler);
    true
}

fn remove_ptr(list: &mut Vec<Handler>, handler: &Handler) -> bool {
    match list.iter().position(|h| Arc::ptr_eq(h, handler)) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}
