//! Notification store: list, unread tally, and read/all-read handling.
//!
//! The unread tally is a side effect. It is decremented at most once per
//! notification id. The set of tallied ids covers every read notification in
//! the list and is rebuilt from each server snapshot. Local actions mark the id
//! in the [`SelfEchoSuppressor`] so their server echo applies data without
//! touching the tally.

use crate::optimistic::{OptimisticController, Rollback};
use chrono::{DateTime, Utc};
use dealsync_core::api::NotificationApi;
use dealsync_core::entity::{Entity, EntityStore, UpdateOutcome};
use dealsync_core::error::{Result, SyncError};
use dealsync_core::events::NotificationNewPayload;
use dealsync_core::notification::{Notification, NotificationPatch};
use dealsync_core::sync::{DedupGuard, SelfEchoSuppressor};
use dealsync_core::transport::Transport;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const ALL_READ_KEY: &str = "notifications:all-read";

#[derive(Debug, Clone, Default)]
pub struct NotificationState {
    pub notifications: EntityStore<Notification>,
    pub unread_count: usize,
    tallied: HashSet<String>,
}

impl NotificationState {
    /// Records that the read side effect for `id` has been applied.
    /// Returns `true` the first time only.
    fn tally_read(&mut self, id: &str) -> bool {
        if self.tallied.insert(id.to_string()) {
            self.unread_count = self.unread_count.saturating_sub(1);
            true
        } else {
            false
        }
    }

    fn mark_read(&mut self, id: &str, at: DateTime<Utc>) -> UpdateOutcome {
        self.notifications.update(id, &NotificationPatch::mark_read(at))
    }

    fn mark_all_read(&mut self, at: DateTime<Utc>) -> usize {
        let patch = NotificationPatch::mark_read(at);
        let mut ids = Vec::new();
        let changed = self.notifications.update_all(|notification| {
            ids.push(notification.id.clone());
            notification.apply_patch(&patch)
        });
        self.tallied.extend(ids);
        self.unread_count = 0;
        changed
    }
}

impl Rollback for NotificationState {
    type Snapshot = NotificationState;

    fn capture(&self) -> Self::Snapshot {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        *self = snapshot;
    }
}

pub struct NotificationStore {
    state: RwLock<NotificationState>,
    echo: Mutex<SelfEchoSuppressor>,
    optimistic: OptimisticController,
    api: Arc<dyn NotificationApi>,
    transport: Arc<dyn Transport>,
}

impl NotificationStore {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        transport: Arc<dyn Transport>,
        echo_window: Duration,
    ) -> Self {
        Self {
            state: RwLock::new(NotificationState::default()),
            echo: Mutex::new(SelfEchoSuppressor::new(echo_window)),
            optimistic: OptimisticController::new(),
            api,
            transport,
        }
    }

    fn echo(&self) -> MutexGuard<'_, SelfEchoSuppressor> {
        self.echo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the list with a server snapshot and recomputes the tally.
    pub async fn set_notifications(&self, notifications: Vec<Notification>) {
        let mut state = self.state.write().await;
        state.notifications.set(notifications);
        state.tallied = state
            .notifications
            .iter()
            .filter(|n| n.read)
            .map(|n| n.id.clone())
            .collect();
        state.unread_count = state.notifications.iter().filter(|n| n.is_unread()).count();
    }

    /// Overrides the tally with a server-provided count.
    pub async fn set_unread_count(&self, count: usize) {
        self.state.write().await.unread_count = count;
    }

    pub async fn notifications(&self) -> Arc<Vec<Notification>> {
        self.state.read().await.notifications.list()
    }

    pub async fn find(&self, id: &str) -> Option<Notification> {
        self.state.read().await.notifications.find_by_id(id).cloned()
    }

    pub async fn unread_count(&self) -> usize {
        self.state.read().await.unread_count
    }

    pub fn is_echo_marked(&self, id: &str) -> bool {
        self.echo().is_marked(id)
    }

    /// Marks `id` as locally changed. Exposed for callers that perform the
    /// change through another channel.
    pub fn mark_local_change(&self, id: &str) {
        self.echo().mark(id);
    }

    pub fn is_mutation_in_flight(&self) -> bool {
        self.optimistic.in_flight()
    }

    // ------------------------------------------------------------------
    // Push handlers
    // ------------------------------------------------------------------

    /// `notification:new`. Returns `true` when the notification was new.
    pub async fn handle_new(&self, payload: NotificationNewPayload) -> bool {
        let notification = payload.into_notification(Utc::now());
        let mut state = self.state.write().await;

        if DedupGuard::admit_entity(&state.notifications, &notification.id).is_new() {
            let unread = notification.is_unread();
            let id = notification.id.clone();
            state.notifications.prepend(notification);
            if unread {
                state.unread_count += 1;
            } else {
                state.tallied.insert(id.clone());
            }
            debug!("[NotificationStore] Added '{}' (unread: {})", id, state.unread_count);
            true
        } else {
            debug!(
                "[NotificationStore] Ignoring replayed notification '{}'",
                notification.id
            );
            false
        }
    }

    /// `notification:read`. Returns `true` when the unread tally changed.
    pub async fn handle_read(&self, id: &str) -> bool {
        let suppressed = self.is_echo_marked(id);
        let mut state = self.state.write().await;

        if state.mark_read(id, Utc::now()) == UpdateOutcome::Missing {
            debug!("[NotificationStore] Read event for unknown notification '{}'", id);
            return false;
        }
        if suppressed {
            debug!("[NotificationStore] Suppressing echo for '{}'", id);
            return false;
        }
        state.tally_read(id)
    }

    /// `notification:all-read`. Returns how many notifications changed.
    ///
    /// Idempotent, so the echo of a local "mark all read" needs no marker.
    pub async fn handle_all_read(&self) -> usize {
        self.state.write().await.mark_all_read(Utc::now())
    }

    // ------------------------------------------------------------------
    // Local actions
    // ------------------------------------------------------------------

    /// Marks one notification read, optimistically.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(SyncError::TransportUnavailable);
        }
        if self.find(id).await.is_none() {
            return Err(SyncError::not_found("Notification", id));
        }

        self.echo().mark(id);
        let api = self.api.clone();
        let owned_id = id.to_string();
        let result = self
            .optimistic
            .mutate(
                &format!("read:{id}"),
                &self.state,
                |state| {
                    state.mark_read(id, Utc::now());
                    state.tally_read(id);
                },
                || async move { api.mark_read(&owned_id).await },
                |state, read_at| {
                    state.notifications.modify(id, |notification| {
                        if notification.read_at == Some(*read_at) {
                            return false;
                        }
                        notification.read_at = Some(*read_at);
                        true
                    });
                },
            )
            .await;

        if result.is_err() {
            self.echo().unmark(id);
        }
        result.map(|_| ())
    }

    /// Marks every notification read, optimistically.
    pub async fn mark_all_read(&self) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(SyncError::TransportUnavailable);
        }

        let api = self.api.clone();
        self.optimistic
            .mutate(
                ALL_READ_KEY,
                &self.state,
                |state| {
                    let changed = state.mark_all_read(Utc::now());
                    info!("[NotificationStore] Marked {} notifications read", changed);
                },
                || async move { api.mark_all_read().await },
                |_, _| {},
            )
            .await
            .map(|_| ())
    }
}
