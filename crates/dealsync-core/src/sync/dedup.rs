//! Deduplication for push events.
//!
//! The entity store already refuses duplicate ids on `add`. Handlers still need
//! to know *before* triggering side effects (unread tallies, completion
//! callbacks) whether an event is new, because a reconnect replays recent
//! events verbatim.

use crate::entity::{Entity, EntityStore};
use std::collections::{HashSet, VecDeque};

/// Whether an incoming event should trigger side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; apply side effects.
    New,
    /// Already applied; data may be re-applied but side effects must not fire.
    Known,
}

impl Admission {
    pub fn is_new(self) -> bool {
        matches!(self, Self::New)
    }
}

/// Bounded memory of event keys that already produced side effects.
///
/// Keys are arbitrary strings such as `"<documentId>:completed"`. The oldest
/// key is forgotten once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct DedupGuard {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupGuard {
    pub const DEFAULT_CAPACITY: usize = 512;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Entity-level check: is `id` already present in `store`?
    pub fn admit_entity<T: Entity>(store: &EntityStore<T>, id: &str) -> Admission {
        if store.contains(id) {
            Admission::Known
        } else {
            Admission::New
        }
    }

    /// Records `key` and reports whether this is its first sighting.
    pub fn observe(&mut self, key: impl Into<String>) -> Admission {
        let key = key.into();
        if self.seen.contains(&key) {
            return Admission::Known;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        Admission::New
    }

    /// Forgets `key` so a later event for it is treated as new again.
    pub fn forget(&mut self, key: &str) {
        if self.seen.remove(key) {
            self.order.retain(|k| k != key);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_reports_first_sighting_only() {
        let mut guard = DedupGuard::default();
        assert_eq!(guard.observe("doc-1:completed"), Admission::New);
        assert_eq!(guard.observe("doc-1:completed"), Admission::Known);
        assert_eq!(guard.observe("doc-2:completed"), Admission::New);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut guard = DedupGuard::new(2);
        guard.observe("a");
        guard.observe("b");
        guard.observe("c");
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.observe("a"), Admission::New);
        assert_eq!(guard.observe("c"), Admission::Known);
    }

    #[test]
    fn test_forget() {
        let mut guard = DedupGuard::default();
        guard.observe("a");
        guard.forget("a");
        assert!(guard.is_empty());
        assert!(guard.observe("a").is_new());
    }
}
