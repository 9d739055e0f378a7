//! Scope-isolated side caches for derived artifacts.

mod composite;

pub use composite::{CompositeCache, CompositeKey};
