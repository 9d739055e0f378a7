//! Multi-subscriber callback registry.
//!
//! Every `register` call hands back a [`Registration`]. Dropping the
//! registration (or calling [`Registration::revoke`]) removes the callback, so
//! a listener can never outlive the component that owns its registration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct RegistryInner<E> {
    next_handle: u64,
    callbacks: BTreeMap<u64, Callback<E>>,
}

fn lock<E>(inner: &Mutex<RegistryInner<E>>) -> MutexGuard<'_, RegistryInner<E>> {
    // A panicking callback never runs under the lock, so the data is still consistent.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of callbacks invoked with `&E`, in registration order.
pub struct CallbackRegistry<E> {
    inner: Arc<Mutex<RegistryInner<E>>>,
}

impl<E: 'static> CallbackRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_handle: 1,
                callbacks: BTreeMap::new(),
            })),
        }
    }

    /// Registers `callback` and returns the owned registration that keeps it alive.
    #[must_use = "dropping the registration immediately unregisters the callback"]
    pub fn register(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Registration<E> {
        let mut inner = lock(&self.inner);
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.callbacks.insert(handle, Arc::new(callback));
        Registration {
            handle,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invokes every registered callback with `event`. Returns how many ran.
    ///
    /// Callbacks run outside the registry lock, so a callback may register or
    /// revoke without deadlocking.
    pub fn notify(&self, event: &E) -> usize {
        let callbacks: Vec<Callback<E>> = lock(&self.inner).callbacks.values().cloned().collect();
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for CallbackRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for CallbackRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &lock(&self.inner).callbacks.len())
            .finish()
    }
}

/// Owned handle for one registered callback. Unregisters on drop.
pub struct Registration<E> {
    handle: u64,
    registry: Weak<Mutex<RegistryInner<E>>>,
}

impl<E> Registration<E> {
    /// Unique handle of this registration within its registry.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|inner| lock(&inner).callbacks.contains_key(&self.handle))
    }

    /// Explicitly unregisters the callback.
    pub fn revoke(self) {
        // Drop does the work.
    }
}

impl<E> Drop for Registration<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            lock(&inner).callbacks.remove(&self.handle);
        }
    }
}

impl<E> fmt::Debug for Registration<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("handle", &self.handle)
            .finish()
    }
}
