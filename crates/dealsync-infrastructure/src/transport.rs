//! In-process [`Transport`].
//!
//! Holds one handler per event name and a log of emitted events. Used to
//! replay recorded push traffic and to drive the engine without a server.

use dealsync_core::error::{Result, SyncError};
use dealsync_core::transport::{EventHandler, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub struct ChannelTransport {
    handlers: Mutex<HashMap<String, EventHandler>>,
    emitted: Mutex<Vec<(String, Value)>>,
    connected: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelTransport {
    /// Creates a connected transport with no subscribers.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            emitted: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Hands `payload` to the handler subscribed for `event`.
    ///
    /// Returns `false` when nobody is subscribed. The handler runs outside the
    /// table lock.
    pub fn deliver(&self, event: &str, payload: Value) -> bool {
        let handler = lock(&self.handlers).get(event).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => {
                debug!("[ChannelTransport] No subscriber for '{}'", event);
                false
            }
        }
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        lock(&self.handlers).contains_key(event)
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    /// Events emitted so far, oldest first.
    pub fn emitted(&self) -> Vec<(String, Value)> {
        lock(&self.emitted).clone()
    }

    /// Drains the emitted-event log.
    pub fn take_emitted(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *lock(&self.emitted))
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ChannelTransport {
    fn subscribe(&self, event: &str, handler: EventHandler) {
        if lock(&self.handlers)
            .insert(event.to_string(), handler)
            .is_some()
        {
            debug!("[ChannelTransport] Replaced handler for '{}'", event);
        }
    }

    fn unsubscribe(&self, event: &str) {
        lock(&self.handlers).remove(event);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::TransportUnavailable);
        }
        lock(&self.emitted).push((event.to_string(), payload));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
