//! Remote API stand-in for running the engine without a server.
//!
//! Every remote mutation fails with `TransportUnavailable`. Scope switches
//! succeed with a local token so scoped replays can run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealsync_application::SyncServices;
use dealsync_core::api::{
    DocumentApi, NotificationApi, ScopeApi, SummaryApi, TeamApi, TransactionApi,
};
use dealsync_core::document::{Document, DocumentPatch, DocumentSummary};
use dealsync_core::error::{Result, SyncError};
use dealsync_core::scope::{ScopeDescriptor, ScopeToken};
use dealsync_core::team::Invite;
use dealsync_core::transaction::{Transaction, TransactionPatch};
use std::sync::Arc;

pub struct OfflineBackend;

impl OfflineBackend {
    pub fn services() -> SyncServices {
        let backend = Arc::new(OfflineBackend);
        SyncServices {
            documents: backend.clone(),
            transactions: backend.clone(),
            notifications: backend.clone(),
            summaries: backend.clone(),
            scope: backend.clone(),
            team: backend,
        }
    }
}

#[async_trait]
impl DocumentApi for OfflineBackend {
    async fn create_document(&self, _draft: &Document) -> Result<Document> {
        Err(SyncError::TransportUnavailable)
    }

    async fn update_document(&self, _id: &str, _patch: &DocumentPatch) -> Result<Document> {
        Err(SyncError::TransportUnavailable)
    }

    async fn delete_document(&self, _id: &str) -> Result<()> {
        Err(SyncError::TransportUnavailable)
    }
}

#[async_trait]
impl TransactionApi for OfflineBackend {
    async fn update_transaction(&self, _id: &str, _patch: &TransactionPatch) -> Result<Transaction> {
        Err(SyncError::TransportUnavailable)
    }

    async fn delete_transaction(&self, _id: &str) -> Result<()> {
        Err(SyncError::TransportUnavailable)
    }
}

#[async_trait]
impl NotificationApi for OfflineBackend {
    async fn mark_read(&self, _id: &str) -> Result<DateTime<Utc>> {
        Err(SyncError::TransportUnavailable)
    }

    async fn mark_all_read(&self) -> Result<DateTime<Utc>> {
        Err(SyncError::TransportUnavailable)
    }
}

#[async_trait]
impl SummaryApi for OfflineBackend {
    async fn request_summary(&self, _scope_id: &str, _document_id: &str) -> Result<String> {
        Err(SyncError::TransportUnavailable)
    }

    async fn fetch_summary(&self, _scope_id: &str, _document_id: &str) -> Result<DocumentSummary> {
        Err(SyncError::TransportUnavailable)
    }
}

#[async_trait]
impl ScopeApi for OfflineBackend {
    async fn switch_scope(&self, descriptor: &ScopeDescriptor) -> Result<ScopeToken> {
        Ok(ScopeToken {
            token: format!("offline:{}", descriptor.key()),
            scope_key: descriptor.key(),
        })
    }
}

#[async_trait]
impl TeamApi for OfflineBackend {
    async fn remove_member(&self, _member_id: &str) -> Result<()> {
        Err(SyncError::TransportUnavailable)
    }

    async fn revoke_invite(&self, _invite_id: &str) -> Result<Invite> {
        Err(SyncError::TransportUnavailable)
    }
}
