//! Sync engine.
//!
//! Binds the stores to a [`Transport`]. Transport handlers only enqueue the raw
//! payload; a single loop drains the queue in arrival order and dispatches each
//! event to its store. Errors from handlers never leave the loop. Secondary
//! effects a handler asks for (summary refreshes) run as tracked background
//! tasks after the event has been applied.

use crate::stores::{ChatStore, DocumentStore, NotificationStore, TeamStore, TransactionStore};
use dealsync_core::api::{
    DocumentApi, NotificationApi, ScopeApi, SummaryApi, TeamApi, TransactionApi,
};
use dealsync_core::config::SyncConfig;
use dealsync_core::conversation::ChatStateRepository;
use dealsync_core::error::Result;
use dealsync_core::events::{
    EntityDeletedPayload, EntityUpdatedPayload, EventName, InboundEvent, ScopeEntityPayload,
    ScopeEntityType,
};
use dealsync_core::scope::{ScopeDescriptor, ScopeToken, ScopeTransition};
use dealsync_core::transport::{EventHandler, Transport};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Remote collaborators the stores call into.
#[derive(Clone)]
pub struct SyncServices {
    pub documents: Arc<dyn DocumentApi>,
    pub transactions: Arc<dyn TransactionApi>,
    pub notifications: Arc<dyn NotificationApi>,
    pub summaries: Arc<dyn SummaryApi>,
    pub scope: Arc<dyn ScopeApi>,
    pub team: Arc<dyn TeamApi>,
}

/// Deferred work requested by a push handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    RefreshSummary {
        scope_id: String,
        document_id: String,
    },
}

#[derive(Debug)]
struct Envelope {
    name: EventName,
    payload: Value,
}

/// Live subscriptions on a transport. Dropping the binding unsubscribes every
/// event it subscribed.
pub struct TransportBinding {
    transport: Arc<dyn Transport>,
    events: Vec<EventName>,
}

impl TransportBinding {
    pub fn events(&self) -> &[EventName] {
        &self.events
    }
}

impl Drop for TransportBinding {
    fn drop(&mut self) {
        for name in &self.events {
            self.transport.unsubscribe(name.as_str());
        }
        debug!("[SyncEngine] Unsubscribed {} events", self.events.len());
    }
}

pub struct SyncEngine {
    transport: Arc<dyn Transport>,
    scope_api: Arc<dyn ScopeApi>,
    chat: Arc<ChatStore>,
    documents: Arc<DocumentStore>,
    notifications: Arc<NotificationStore>,
    transactions: Arc<TransactionStore>,
    team: Arc<TeamStore>,
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
    binding: Mutex<Option<TransportBinding>>,
    scope_token: RwLock<Option<ScopeToken>>,
    followups: TaskTracker,
}

impl SyncEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        services: SyncServices,
        repository: Option<Arc<dyn ChatStateRepository>>,
        config: &SyncConfig,
    ) -> Self {
        let repository = repository.filter(|_| config.persist_chat);
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            chat: Arc::new(ChatStore::new(transport.clone(), repository)),
            documents: Arc::new(DocumentStore::new(
                services.documents,
                services.summaries,
                config.summary_poll_schedule(),
            )),
            notifications: Arc::new(NotificationStore::new(
                services.notifications,
                transport.clone(),
                config.echo_window(),
            )),
            transactions: Arc::new(TransactionStore::new(services.transactions)),
            team: Arc::new(TeamStore::new(services.team)),
            scope_api: services.scope,
            transport,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            binding: Mutex::new(None),
            scope_token: RwLock::new(None),
            followups: TaskTracker::new(),
        }
    }

    pub fn chat(&self) -> &Arc<ChatStore> {
        &self.chat
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    pub fn transactions(&self) -> &Arc<TransactionStore> {
        &self.transactions
    }

    pub fn team(&self) -> &Arc<TeamStore> {
        &self.team
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn binding(&self) -> MutexGuard<'_, Option<TransportBinding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Transport binding
    // ------------------------------------------------------------------

    /// Subscribes every inbound event. An existing binding is released first,
    /// so calling this on reconnect never stacks handlers.
    pub fn connect(&self) {
        let mut binding = self.binding();
        if binding.take().is_some() {
            debug!("[SyncEngine] Replacing existing transport binding");
        }

        for name in EventName::INBOUND {
            let sender = self.sender.clone();
            let handler: EventHandler = Arc::new(move |payload: Value| {
                if sender.send(Envelope { name, payload }).is_err() {
                    debug!("[SyncEngine] Dropping '{}': engine is gone", name);
                }
            });
            self.transport.subscribe(name.as_str(), handler);
        }

        *binding = Some(TransportBinding {
            transport: self.transport.clone(),
            events: EventName::INBOUND.to_vec(),
        });
        info!("[SyncEngine] Subscribed {} events", EventName::INBOUND.len());
    }

    /// Releases the transport binding. Returns `false` when none was active.
    pub fn disconnect(&self) -> bool {
        self.binding().take().is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.binding().is_some()
    }

    /// Queues an event as if the transport had delivered it.
    pub fn enqueue(&self, name: EventName, payload: Value) {
        if self.sender.send(Envelope { name, payload }).is_err() {
            warn!("[SyncEngine] Event queue closed; dropping '{}'", name);
        }
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Drains events until `cancel` fires. Returns how many were dispatched.
    pub async fn run(&self, cancel: CancellationToken) -> usize {
        let mut receiver = self.receiver.lock().await;
        let mut dispatched = 0;
        info!("[SyncEngine] Event loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                envelope = receiver.recv() => match envelope {
                    Some(envelope) => {
                        self.dispatch(envelope.name, envelope.payload).await;
                        dispatched += 1;
                    }
                    None => break,
                },
            }
        }
        info!("[SyncEngine] Event loop stopped after {} events", dispatched);
        dispatched
    }

    /// Dispatches every event queued so far, then returns.
    pub async fn drain(&self) -> usize {
        let mut receiver = self.receiver.lock().await;
        let mut dispatched = 0;
        while let Ok(envelope) = receiver.try_recv() {
            self.dispatch(envelope.name, envelope.payload).await;
            dispatched += 1;
        }
        dispatched
    }

    /// Applies one event. Malformed payloads are logged and dropped.
    pub async fn dispatch(&self, name: EventName, payload: Value) {
        let event = match InboundEvent::parse(name, payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("[SyncEngine] Ignoring event: {}", e);
                return;
            }
        };
        for followup in self.apply(event).await {
            self.schedule(followup);
        }
    }

    async fn apply(&self, event: InboundEvent) -> Vec<FollowUp> {
        match event {
            InboundEvent::EntityProgress(payload) => {
                if let Some(complete) = self.documents.handle_progress(payload).await {
                    return vec![FollowUp::RefreshSummary {
                        scope_id: complete.scope_id,
                        document_id: complete.document_id,
                    }];
                }
            }
            InboundEvent::EntityUpdated(payload) => self.route_update(&payload).await,
            InboundEvent::EntityDeleted(payload) => {
                self.documents.handle_deleted(&payload).await;
            }
            InboundEvent::NotificationNew(payload) => {
                self.notifications.handle_new(payload).await;
            }
            InboundEvent::NotificationRead(payload) => {
                self.notifications.handle_read(&payload.id).await;
            }
            InboundEvent::NotificationAllRead => {
                self.notifications.handle_all_read().await;
            }
            InboundEvent::ChatMessage(payload) => {
                self.chat.handle_message(payload).await;
            }
            InboundEvent::ChatTyping(payload) => {
                self.chat.handle_typing(payload.is_typing).await;
            }
            InboundEvent::ScopeEntityCreated(payload) => match payload.entity_type {
                ScopeEntityType::Document => {
                    self.documents.handle_created(&payload).await;
                }
                ScopeEntityType::Transaction => {
                    self.transactions.handle_created(&payload).await;
                }
                ScopeEntityType::Other => debug!("[SyncEngine] Ignoring unknown scope entity"),
            },
            InboundEvent::ScopeEntityUpdated(payload) => match payload.entity_type {
                ScopeEntityType::Document => {
                    if let Some(update) = as_entity_update(&payload) {
                        self.documents.handle_updated(&update).await;
                    }
                }
                ScopeEntityType::Transaction => {
                    self.transactions.handle_scope_updated(&payload).await;
                }
                ScopeEntityType::Other => debug!("[SyncEngine] Ignoring unknown scope entity"),
            },
            InboundEvent::ScopeEntityDeleted(payload) => match payload.entity_type {
                ScopeEntityType::Document => {
                    if let Some(id) = payload.resolved_id() {
                        let deleted = EntityDeletedPayload {
                            entity_id: id,
                            scope_id: payload.scope_id.clone(),
                            name: None,
                            timestamp: payload.timestamp,
                        };
                        self.documents.handle_deleted(&deleted).await;
                    }
                }
                ScopeEntityType::Transaction => {
                    self.transactions.handle_scope_deleted(&payload).await;
                }
                ScopeEntityType::Other => debug!("[SyncEngine] Ignoring unknown scope entity"),
            },
        }
        Vec::new()
    }

    /// `entity:updated` carries no entity type; route by which store knows the id.
    async fn route_update(&self, payload: &EntityUpdatedPayload) {
        if self.documents.find(&payload.entity_id).await.is_some() {
            self.documents.handle_updated(payload).await;
        } else if self.transactions.contains(&payload.entity_id).await {
            self.transactions.handle_updated(payload).await;
        } else {
            debug!(
                "[SyncEngine] Update for unknown entity '{}'",
                payload.entity_id
            );
        }
    }

    fn schedule(&self, followup: FollowUp) {
        match followup {
            FollowUp::RefreshSummary {
                scope_id,
                document_id,
            } => {
                let documents = self.documents.clone();
                self.followups.spawn(async move {
                    match documents.refresh_summary(&scope_id, &document_id).await {
                        Ok(_) => {}
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => warn!(
                            "[SyncEngine] Summary refresh for '{}' failed: {}",
                            document_id, e
                        ),
                    }
                });
            }
        }
    }

    /// Waits until every scheduled follow-up has finished.
    pub async fn wait_for_followups(&self) {
        self.followups.close();
        self.followups.wait().await;
        self.followups.reopen();
    }

    // ------------------------------------------------------------------
    // Scope
    // ------------------------------------------------------------------

    /// Moves every store to `descriptor`.
    ///
    /// When the routing key changes the server is asked for a fresh scope token
    /// first; if that fails nothing changes locally. Document state of the
    /// previous scope is torn down after a switch.
    pub async fn set_scope(&self, descriptor: ScopeDescriptor) -> Result<ScopeTransition> {
        if descriptor.key() == self.chat.scope_key().await {
            return Ok(self.chat.set_scope(descriptor).await);
        }

        let token = self.scope_api.switch_scope(&descriptor).await?;
        *self.scope_token.write().await = Some(token);

        let transition = self.chat.set_scope(descriptor).await;
        self.documents.clear().await;
        Ok(transition)
    }

    pub async fn scope_token(&self) -> Option<ScopeToken> {
        self.scope_token.read().await.clone()
    }

    pub async fn select_document(&self, document_id: Option<String>) {
        self.chat.select_resource(document_id).await;
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.followups.close();
    }
}

fn as_entity_update(payload: &ScopeEntityPayload) -> Option<EntityUpdatedPayload> {
    let Some(entity_id) = payload.resolved_id() else {
        warn!("[SyncEngine] scope-entity:updated without id");
        return None;
    };
    Some(EntityUpdatedPayload {
        entity_id,
        updates: payload.updates.clone(),
        timestamp: payload.timestamp,
    })
}
