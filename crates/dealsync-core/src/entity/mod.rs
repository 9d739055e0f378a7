//! Generic keyed-entity domain module.
//!
//! # Module Structure
//!
//! - `model`: the `Entity` trait and patch-merge helpers
//! - `store`: `EntityStore`, the idempotent keyed collection every store builds on

mod model;
mod store;

pub use model::{merge_field, merge_optional_field, Entity};
pub use store::{AddOutcome, EntityStore, UpdateOutcome};
