#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealsync_application::{SyncEngine, SyncServices};
use dealsync_core::api::{
    DocumentApi, NotificationApi, ScopeApi, SummaryApi, TeamApi, TransactionApi,
};
use dealsync_core::config::SyncConfig;
use dealsync_core::conversation::{ChatStateRepository, PersistedChat};
use dealsync_core::document::{Document, DocumentPatch, DocumentSummary, SummaryStatus};
use dealsync_core::error::{Result, SyncError};
use dealsync_core::scope::{ScopeDescriptor, ScopeToken};
use dealsync_core::team::{Invite, InviteStatus, TeamRole};
use dealsync_core::transaction::{Transaction, TransactionPatch};
use dealsync_core::transport::{EventHandler, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Mock transport: handler table, connected flag, emitted log.
#[derive(Default)]
pub struct MockTransport {
    handlers: Mutex<HashMap<String, EventHandler>>,
    emitted: Mutex<Vec<(String, Value)>>,
    offline: AtomicBool,
    subscribes: AtomicUsize,
    unsubscribes: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, connected: bool) {
        self.offline.store(!connected, Ordering::SeqCst);
    }

    /// Invokes the handler subscribed for `event`, as the server would.
    pub fn deliver(&self, event: &str, payload: Value) -> bool {
        let handler = self.handlers.lock().unwrap().get(event).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn subscribe(&self, event: &str, handler: EventHandler) {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().insert(event.to_string(), handler);
    }

    fn unsubscribe(&self, event: &str) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().remove(event);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::TransportUnavailable);
        }
        self.emitted.lock().unwrap().push((event.to_string(), payload));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}

// Mock backend implementing every remote API.
#[derive(Default)]
pub struct MockBackend {
    pub reject: AtomicBool,
    pub summary_fetches: AtomicUsize,
    pub scope_switches: Mutex<Vec<ScopeDescriptor>>,
    /// When set, summary fetches wait for `summary_release`.
    pub hold_summaries: AtomicBool,
    pub summary_release: tokio::sync::Notify,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SyncError::rejected("Request refused by server"));
        }
        Ok(())
    }
}

pub fn services(backend: &Arc<MockBackend>) -> SyncServices {
    SyncServices {
        documents: backend.clone(),
        transactions: backend.clone(),
        notifications: backend.clone(),
        summaries: backend.clone(),
        scope: backend.clone(),
        team: backend.clone(),
    }
}

#[async_trait]
impl DocumentApi for MockBackend {
    async fn create_document(&self, draft: &Document) -> Result<Document> {
        self.check()?;
        let mut created = draft.clone();
        created.id = format!("srv-{}", draft.name);
        Ok(created)
    }

    async fn update_document(&self, id: &str, _patch: &DocumentPatch) -> Result<Document> {
        self.check()?;
        Err(SyncError::not_found("Document", id))
    }

    async fn delete_document(&self, _id: &str) -> Result<()> {
        self.check()
    }
}

#[async_trait]
impl TransactionApi for MockBackend {
    async fn update_transaction(&self, id: &str, _patch: &TransactionPatch) -> Result<Transaction> {
        self.check()?;
        Ok(Transaction::new(id, "server"))
    }

    async fn delete_transaction(&self, _id: &str) -> Result<()> {
        self.check()
    }
}

#[async_trait]
impl NotificationApi for MockBackend {
    async fn mark_read(&self, _id: &str) -> Result<DateTime<Utc>> {
        self.check()?;
        Ok(Utc::now())
    }

    async fn mark_all_read(&self) -> Result<DateTime<Utc>> {
        self.check()?;
        Ok(Utc::now())
    }
}

#[async_trait]
impl SummaryApi for MockBackend {
    async fn request_summary(&self, _scope_id: &str, document_id: &str) -> Result<String> {
        self.check()?;
        Ok(format!("job-{document_id}"))
    }

    async fn fetch_summary(&self, _scope_id: &str, document_id: &str) -> Result<DocumentSummary> {
        self.summary_fetches.fetch_add(1, Ordering::SeqCst);
        if self.hold_summaries.load(Ordering::SeqCst) {
            self.summary_release.notified().await;
        }
        Ok(DocumentSummary {
            status: SummaryStatus::Ready,
            text: Some(format!("Summary of {document_id}")),
            job_id: None,
            generated_at: Some(Utc::now()),
        })
    }
}

#[async_trait]
impl ScopeApi for MockBackend {
    async fn switch_scope(&self, descriptor: &ScopeDescriptor) -> Result<ScopeToken> {
        self.check()?;
        self.scope_switches.lock().unwrap().push(descriptor.clone());
        Ok(ScopeToken {
            token: format!("token-{}", descriptor.key()),
            scope_key: descriptor.key(),
        })
    }
}

#[async_trait]
impl TeamApi for MockBackend {
    async fn remove_member(&self, _member_id: &str) -> Result<()> {
        self.check()
    }

    async fn revoke_invite(&self, invite_id: &str) -> Result<Invite> {
        self.check()?;
        Ok(Invite {
            id: invite_id.to_string(),
            email: "invitee@example.com".to_string(),
            role: TeamRole::Agent,
            status: InviteStatus::Revoked,
            created_at: Utc::now(),
        })
    }
}

// In-memory chat state repository.
#[derive(Default)]
pub struct MemoryChatRepository {
    pub state: Mutex<Option<PersistedChat>>,
    pub saves: AtomicUsize,
}

impl MemoryChatRepository {
    pub fn with(state: PersistedChat) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatStateRepository for MemoryChatRepository {
    async fn load(&self) -> Result<Option<PersistedChat>> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, state: &PersistedChat) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub transport: Arc<MockTransport>,
    pub backend: Arc<MockBackend>,
}

pub fn harness() -> Harness {
    harness_with(None)
}

pub fn harness_with(repository: Option<Arc<dyn ChatStateRepository>>) -> Harness {
    let transport = MockTransport::new();
    let backend = MockBackend::new();
    let engine = SyncEngine::new(
        transport.clone(),
        services(&backend),
        repository,
        &SyncConfig::default(),
    );
    engine.connect();
    Harness {
        engine,
        transport,
        backend,
    }
}
