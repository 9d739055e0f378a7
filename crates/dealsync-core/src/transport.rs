//! Transport collaborator.
//!
//! The persistent server connection is consumed only through this trait.
//! Implementations decide how handlers are invoked; the engine only relies on
//! `unsubscribe` removing the handler for that event name.

use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked with the raw payload of a pushed event.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

pub trait Transport: Send + Sync {
    /// Installs `handler` for `event`, replacing any previous handler for it.
    fn subscribe(&self, event: &str, handler: EventHandler);

    /// Removes the handler for `event`. Unknown names are ignored.
    fn unsubscribe(&self, event: &str);

    /// Sends `payload` under `event`.
    fn emit(&self, event: &str, payload: Value) -> Result<()>;

    fn is_connected(&self) -> bool;
}
