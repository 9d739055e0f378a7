//! Cache keyed by `(owner scope, entity)`.
//!
//! The same entity id can legitimately appear under two scopes (a document
//! shared between transactions, a recycled id after deletion). Keying only by
//! entity id would let a summary generated in one transaction surface in
//! another, so every lookup must name its owner.

use std::collections::HashMap;
use std::fmt;

/// Structured composite key. Both halves are stored separately, so no pair of
/// ids can collide regardless of which characters they contain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    owner: String,
    entity: String,
}

impl CompositeKey {
    pub fn new(owner: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entity: entity.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl fmt::Display for CompositeKey {
    /// `owner:entity`, for logs only. Not used for lookups.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.entity)
    }
}

/// Owner-isolated cache of derived values.
#[derive(Debug, Clone)]
pub struct CompositeCache<V> {
    entries: HashMap<CompositeKey, V>,
}

impl<V> CompositeCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Stores `value` for `entity` under `owner`, returning the previous value for that exact pair.
    pub fn set(&mut self, owner: &str, entity: &str, value: V) -> Option<V> {
        self.entries.insert(CompositeKey::new(owner, entity), value)
    }

    /// Returns the value stored for this exact `(owner, entity)` pair.
    ///
    /// A value stored under another owner is never returned.
    pub fn get(&self, owner: &str, entity: &str) -> Option<&V> {
        self.entries.get(&CompositeKey::new(owner, entity))
    }

    pub fn get_mut(&mut self, owner: &str, entity: &str) -> Option<&mut V> {
        self.entries.get_mut(&CompositeKey::new(owner, entity))
    }

    pub fn remove(&mut self, owner: &str, entity: &str) -> Option<V> {
        self.entries.remove(&CompositeKey::new(owner, entity))
    }

    /// Drops every entry belonging to `owner`.
    pub fn clear_owner(&mut self, owner: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.owner != owner);
        before - self.entries.len()
    }

    /// Empties the whole key space.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for CompositeCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
