//! Entity trait shared by every keyed record.

use std::fmt::Debug;

/// A record with a stable string identity that can absorb partial updates.
///
/// Every collection-backed domain type (documents, notifications, transactions,
/// team members, conversations) implements this so that a single
/// [`EntityStore`](super::EntityStore) can hold it.
pub trait Entity: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Partial update accepted by [`Entity::apply_patch`]. Absent fields are left untouched.
    type Patch: Clone + Debug + Default + Send + Sync;

    /// Name used in logs and `NotFound` errors.
    const ENTITY_TYPE: &'static str;

    /// The stable identifier.
    fn id(&self) -> &str;

    /// Merges `patch` into `self`, returning `true` when any field actually changed.
    fn apply_patch(&mut self, patch: &Self::Patch) -> bool;
}

/// Overwrites `slot` with `value` when the patch carries a different value.
pub fn merge_field<T: PartialEq + Clone>(slot: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(next) if slot != next => {
            *slot = next.clone();
            true
        }
        _ => false,
    }
}

/// Same as [`merge_field`] for nullable fields, where `Some(None)` clears the slot.
pub fn merge_optional_field<T: PartialEq + Clone>(
    slot: &mut Option<T>,
    value: &Option<Option<T>>,
) -> bool {
    match value {
        Some(next) if slot != next => {
            *slot = next.clone();
            true
        }
        _ => false,
    }
}
