//! Domain layer of dealsync: models, keyed stores, scope routing, echo and
//! duplicate guards, event payloads, and the traits the outer layers implement.

pub mod api;
pub mod cache;
pub mod config;
pub mod conversation;
pub mod document;
pub mod entity;
pub mod error;
pub mod events;
pub mod notification;
pub mod scope;
pub mod sync;
pub mod team;
pub mod transaction;
pub mod transport;

// Re-export common error type
pub use error::{Result, SyncError};
