//! Application layer of dealsync: stateful stores, the optimistic mutation
//! controller, and the engine that binds them to a transport.

pub mod engine;
pub mod optimistic;
pub mod stores;

pub use engine::{FollowUp, SyncEngine, SyncServices, TransportBinding};
pub use optimistic::{OptimisticController, Rollback};
