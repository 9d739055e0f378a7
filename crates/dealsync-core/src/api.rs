//! Remote API collaborators.
//!
//! The HTTP client is external; stores depend on these traits only. Errors are
//! reported as [`SyncError`](crate::error::SyncError), with server-side refusals
//! mapped to `SyncError::Rejected`.

use crate::document::{Document, DocumentPatch, DocumentSummary};
use crate::error::Result;
use crate::scope::{ScopeDescriptor, ScopeToken};
use crate::team::Invite;
use crate::transaction::{Transaction, TransactionPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Creates `draft` on the server and returns the authoritative record.
    async fn create_document(&self, draft: &Document) -> Result<Document>;

    async fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<Document>;

    async fn delete_document(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait TransactionApi: Send + Sync {
    async fn update_transaction(&self, id: &str, patch: &TransactionPatch) -> Result<Transaction>;

    async fn delete_transaction(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Returns the server's read timestamp.
    async fn mark_read(&self, id: &str) -> Result<DateTime<Utc>>;

    async fn mark_all_read(&self) -> Result<DateTime<Utc>>;
}

#[async_trait]
pub trait SummaryApi: Send + Sync {
    /// Starts summary generation and returns the job id.
    async fn request_summary(&self, scope_id: &str, document_id: &str) -> Result<String>;

    /// Current state of the summary for `document_id` within `scope_id`.
    async fn fetch_summary(&self, scope_id: &str, document_id: &str) -> Result<DocumentSummary>;
}

#[async_trait]
pub trait ScopeApi: Send + Sync {
    /// Switches the server-side active scope and returns the refreshed token.
    async fn switch_scope(&self, descriptor: &ScopeDescriptor) -> Result<ScopeToken>;
}

#[async_trait]
pub trait TeamApi: Send + Sync {
    async fn remove_member(&self, member_id: &str) -> Result<()>;

    /// Revokes a pending invite; returns the invite as the server now sees it.
    async fn revoke_invite(&self, invite_id: &str) -> Result<Invite>;
}
