//! Notification domain module.

mod model;

pub use model::{Notification, NotificationPatch, NotificationPriority, ScopeRefs};
