//! Idempotent keyed collection.

use super::model::Entity;
use std::sync::Arc;

/// Result of [`EntityStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entity was new and is now part of the collection.
    Inserted,
    /// An entity with the same id was already present; nothing changed.
    Duplicate,
}

impl AddOutcome {
    pub fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Result of [`EntityStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// At least one field changed.
    Updated,
    /// The entity exists but the patch carried nothing new.
    Unchanged,
    /// No entity with that id; late updates for deleted entities land here.
    Missing,
}

/// An ordered collection of entities keyed by id.
///
/// The list lives behind an `Arc` so that readers can hold a cheap snapshot.
/// Every mutation that changes contents installs a *new* `Arc` and bumps the
/// revision; mutations that change nothing keep both, so callers can detect
/// change with [`Arc::ptr_eq`] or by comparing revisions.
///
/// Cloning the store is O(1) and is what optimistic rollback uses as its
/// pre-image.
#[derive(Debug, Clone)]
pub struct EntityStore<T: Entity> {
    items: Arc<Vec<T>>,
    revision: u64,
}

impl<T: Entity> EntityStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            revision: 0,
        }
    }

    /// Creates a store holding `items` (first occurrence of each id wins).
    pub fn from_items(items: Vec<T>) -> Self {
        let mut store = Self::new();
        store.set(items);
        store
    }

    /// Replaces the whole collection.
    ///
    /// Duplicate ids inside `items` are dropped (first occurrence wins). Returns
    /// `false` and keeps the current list identity when the contents are equal.
    pub fn set(&mut self, items: Vec<T>) -> bool {
        let mut deduped: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            if deduped.iter().any(|existing| existing.id() == item.id()) {
                tracing::debug!(
                    "[EntityStore] Dropping duplicate {} '{}' from set()",
                    T::ENTITY_TYPE,
                    item.id()
                );
                continue;
            }
            deduped.push(item);
        }

        if *self.items == deduped {
            return false;
        }
        self.install(deduped);
        true
    }

    /// Appends `entity` unless an entity with the same id already exists.
    ///
    /// An existing entity is never overwritten.
    pub fn add(&mut self, entity: T) -> AddOutcome {
        self.insert_with(entity, |items, entity| items.push(entity))
    }

    /// Inserts `entity` at the front unless its id already exists.
    ///
    /// Used for newest-first collections such as notifications.
    pub fn prepend(&mut self, entity: T) -> AddOutcome {
        self.insert_with(entity, |items, entity| items.insert(0, entity))
    }

    fn insert_with(&mut self, entity: T, place: impl FnOnce(&mut Vec<T>, T)) -> AddOutcome {
        if self.contains(entity.id()) {
            tracing::debug!(
                "[EntityStore] Ignoring duplicate {} '{}'",
                T::ENTITY_TYPE,
                entity.id()
            );
            return AddOutcome::Duplicate;
        }
        let mut next = (*self.items).clone();
        place(&mut next, entity);
        self.install(next);
        AddOutcome::Inserted
    }

    /// Removes and returns the entity with `id`, if present.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let position = self.position(id)?;
        let mut next = (*self.items).clone();
        let removed = next.remove(position);
        self.install(next);
        Some(removed)
    }

    /// Partially merges `patch` into the entity with `id`.
    ///
    /// Unknown ids are not an error: they return [`UpdateOutcome::Missing`].
    pub fn update(&mut self, id: &str, patch: &T::Patch) -> UpdateOutcome {
        let Some(position) = self.position(id) else {
            tracing::debug!(
                "[EntityStore] Ignoring update for unknown {} '{}'",
                T::ENTITY_TYPE,
                id
            );
            return UpdateOutcome::Missing;
        };

        let mut candidate = self.items[position].clone();
        if !candidate.apply_patch(patch) {
            return UpdateOutcome::Unchanged;
        }

        let mut next = (*self.items).clone();
        next[position] = candidate;
        self.install(next);
        UpdateOutcome::Updated
    }

    /// Runs `f` against a copy of the entity with `id`; the copy is installed
    /// only when `f` reports a change.
    pub fn modify(&mut self, id: &str, f: impl FnOnce(&mut T) -> bool) -> UpdateOutcome {
        let Some(position) = self.position(id) else {
            return UpdateOutcome::Missing;
        };
        let mut candidate = self.items[position].clone();
        if !f(&mut candidate) {
            return UpdateOutcome::Unchanged;
        }
        let mut next = (*self.items).clone();
        next[position] = candidate;
        self.install(next);
        UpdateOutcome::Updated
    }

    /// Replaces the entity stored under `id` with `entity` (whose id may differ,
    /// e.g. a server id replacing a temporary one). Returns `false` if `id` is unknown.
    pub fn replace(&mut self, id: &str, entity: T) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        if self.items[position] == entity {
            return true;
        }
        // The replacement may collide with an entity that already carries its id;
        // the replacement wins and keeps the original slot.
        let next: Vec<T> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                if index == position {
                    Some(entity.clone())
                } else if item.id() == entity.id() {
                    None
                } else {
                    Some(item.clone())
                }
            })
            .collect();
        self.install(next);
        true
    }

    /// Applies `f` to every entity; installs a new list only if some call returned `true`.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut T) -> bool) -> usize {
        let mut next = (*self.items).clone();
        let mut changed = 0;
        for item in next.iter_mut() {
            if f(item) {
                changed += 1;
            }
        }
        if changed > 0 {
            self.install(next);
        }
        changed
    }

    /// Removes every entity. Keeps identity when already empty.
    pub fn clear(&mut self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.install(Vec::new());
        true
    }

    pub fn find_by_id(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Cheap snapshot of the current list.
    pub fn list(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Monotonic counter bumped on every content change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn install(&mut self, items: Vec<T>) {
        self.items = Arc::new(items);
        self.revision += 1;
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> PartialEq for EntityStore<T> {
    /// Value equality over the contained entities; revisions are ignored.
    fn eq(&self, other: &Self) -> bool {
        *self.items == *other.items
    }
}
