//! Optimistic mutation controller.
//!
//! A mutation is applied to local state immediately, then confirmed remotely.
//! On failure the captured pre-image is restored; on success server-authoritative
//! fields are reconciled. Each logical mutation key carries a monotonically
//! increasing version so that an older call resolving late never clobbers the
//! outcome of a newer one.

use dealsync_core::entity::{Entity, EntityStore};
use dealsync_core::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// State that can be captured before a mutation and restored afterwards.
pub trait Rollback {
    type Snapshot: Send;

    fn capture(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}

impl<T: Entity> Rollback for EntityStore<T> {
    type Snapshot = EntityStore<T>;

    fn capture(&self) -> Self::Snapshot {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        *self = snapshot;
    }
}

#[derive(Debug, Default)]
struct KeyState {
    latest: u64,
    pending: usize,
}

/// Tracks in-flight optimistic mutations and their per-key versions.
#[derive(Debug, Default)]
pub struct OptimisticController {
    keys: Mutex<HashMap<String, KeyState>>,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counters however the mutation ends.
struct InFlight<'a> {
    controller: &'a OptimisticController,
    key: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.controller.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut keys = self.controller.lock_keys();
        if let Some(state) = keys.get_mut(self.key) {
            state.pending = state.pending.saturating_sub(1);
            if state.pending == 0 {
                keys.remove(self.key);
            }
        }
    }
}

impl OptimisticController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_keys(&self) -> MutexGuard<'_, HashMap<String, KeyState>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether any mutation is awaiting its remote call.
    pub fn in_flight(&self) -> bool {
        self.in_flight_count() > 0
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether a mutation for `key` is awaiting its remote call.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.lock_keys()
            .get(key)
            .is_some_and(|state| state.pending > 0)
    }

    fn begin<'a>(&'a self, key: &'a str) -> (u64, InFlight<'a>) {
        let mut keys = self.lock_keys();
        let state = keys.entry(key.to_string()).or_default();
        state.latest += 1;
        state.pending += 1;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        (
            state.latest,
            InFlight {
                controller: self,
                key,
            },
        )
    }

    fn is_latest(&self, key: &str, version: u64) -> bool {
        self.lock_keys()
            .get(key)
            .is_some_and(|state| state.latest == version)
    }

    /// Runs one optimistic mutation against `state`.
    ///
    /// `apply` runs synchronously under the write lock before `remote` is
    /// polled. If `remote` fails, the pre-image is restored (unless a newer
    /// mutation for `key` has started since) and the error is returned. If it
    /// succeeds, `reconcile` merges the server's answer (again only for the
    /// newest mutation of `key`).
    pub async fn mutate<S, R, Fut>(
        &self,
        key: &str,
        state: &RwLock<S>,
        apply: impl FnOnce(&mut S),
        remote: impl FnOnce() -> Fut,
        reconcile: impl FnOnce(&mut S, &R),
    ) -> Result<R>
    where
        S: Rollback,
        Fut: Future<Output = Result<R>>,
    {
        let snapshot = {
            let mut guard = state.write().await;
            let snapshot = guard.capture();
            apply(&mut guard);
            snapshot
        };

        let (version, _in_flight) = self.begin(key);
        let outcome = remote().await;

        match outcome {
            Ok(response) => {
                if self.is_latest(key, version) {
                    reconcile(&mut *state.write().await, &response);
                } else {
                    debug!(
                        "[Optimistic] '{}' v{} confirmed after a newer mutation; skipping reconcile",
                        key, version
                    );
                }
                Ok(response)
            }
            Err(err) => {
                if self.is_latest(key, version) {
                    state.write().await.restore(snapshot);
                    warn!("[Optimistic] '{}' rolled back: {}", key, err);
                } else {
                    warn!(
                        "[Optimistic] '{}' v{} failed after a newer mutation; keeping newer state: {}",
                        key, version, err
                    );
                }
                Err(err)
            }
        }
    }
}
