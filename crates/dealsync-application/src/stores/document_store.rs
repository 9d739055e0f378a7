//! Document store.
//!
//! Documents of the active transaction, their processing progress, and the
//! generated summaries cached per `(scope, document)`.

use crate::optimistic::OptimisticController;
use chrono::Utc;
use dealsync_core::api::{DocumentApi, SummaryApi};
use dealsync_core::cache::CompositeCache;
use dealsync_core::document::{
    Document, DocumentPatch, DocumentStatus, DocumentSummary, ProcessingProgress, ProcessingStep,
};
use dealsync_core::entity::{EntityStore, UpdateOutcome};
use dealsync_core::error::{Result, SyncError};
use dealsync_core::events::{
    map_fields, EntityDeletedPayload, EntityUpdatedPayload, ProgressPayload, ScopeEntityPayload,
    DOCUMENT_FIELDS,
};
use dealsync_core::sync::{CallbackRegistry, DedupGuard, Registration};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fired once per document when processing reaches the terminal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingComplete {
    pub document_id: String,
    pub scope_id: String,
}

fn completion_key(document_id: &str) -> String {
    format!("{document_id}:completed")
}

pub struct DocumentStore {
    documents: RwLock<EntityStore<Document>>,
    summaries: RwLock<CompositeCache<DocumentSummary>>,
    completions: Mutex<DedupGuard>,
    processing_complete: CallbackRegistry<ProcessingComplete>,
    optimistic: OptimisticController,
    api: Arc<dyn DocumentApi>,
    summary_api: Arc<dyn SummaryApi>,
    poll_schedule: Vec<Duration>,
}

impl DocumentStore {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        summary_api: Arc<dyn SummaryApi>,
        poll_schedule: Vec<Duration>,
    ) -> Self {
        Self {
            documents: RwLock::new(EntityStore::new()),
            summaries: RwLock::new(CompositeCache::new()),
            completions: Mutex::new(DedupGuard::default()),
            processing_complete: CallbackRegistry::new(),
            optimistic: OptimisticController::new(),
            api,
            summary_api,
            poll_schedule,
        }
    }

    fn completions(&self) -> MutexGuard<'_, DedupGuard> {
        self.completions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub async fn set_documents(&self, documents: Vec<Document>) -> bool {
        self.documents.write().await.set(documents)
    }

    pub async fn documents(&self) -> Arc<Vec<Document>> {
        self.documents.read().await.list()
    }

    pub async fn find(&self, id: &str) -> Option<Document> {
        self.documents.read().await.find_by_id(id).cloned()
    }

    pub async fn summary(&self, scope_id: &str, document_id: &str) -> Option<DocumentSummary> {
        self.summaries.read().await.get(scope_id, document_id).cloned()
    }

    pub fn is_mutation_in_flight(&self) -> bool {
        self.optimistic.in_flight()
    }

    /// Registers `callback` for processing completion.
    #[must_use = "dropping the registration immediately unregisters the callback"]
    pub fn on_processing_complete(
        &self,
        callback: impl Fn(&ProcessingComplete) + Send + Sync + 'static,
    ) -> Registration<ProcessingComplete> {
        self.processing_complete.register(callback)
    }

    /// Tears down all document state (documents, summaries, completion memory).
    pub async fn clear(&self) {
        let removed = {
            let mut documents = self.documents.write().await;
            let count = documents.len();
            documents.clear();
            count
        };
        self.summaries.write().await.clear();
        self.completions().clear();
        debug!("[DocumentStore] Cleared {} documents and all summaries", removed);
    }

    // ------------------------------------------------------------------
    // Local mutations
    // ------------------------------------------------------------------

    /// Creates a document. A placeholder is shown under a temporary id until
    /// the server answers.
    pub async fn create_document(&self, draft: Document) -> Result<Document> {
        let temp_id = format!("temp-{}", Uuid::new_v4());
        let mut placeholder = draft.clone();
        placeholder.id = temp_id.clone();

        let api = self.api.clone();
        self.optimistic
            .mutate(
                &temp_id,
                &self.documents,
                |documents| {
                    documents.add(placeholder);
                },
                || async move { api.create_document(&draft).await },
                |documents, created| {
                    documents.replace(&temp_id, created.clone());
                },
            )
            .await
    }

    pub async fn update_document(&self, id: &str, patch: DocumentPatch) -> Result<Document> {
        if !self.documents.read().await.contains(id) {
            return Err(SyncError::not_found("Document", id));
        }
        let api = self.api.clone();
        let owned_id = id.to_string();
        let remote_patch = patch.clone();
        self.optimistic
            .mutate(
                &format!("document:{id}"),
                &self.documents,
                |documents| {
                    documents.update(id, &patch);
                },
                || async move { api.update_document(&owned_id, &remote_patch).await },
                |documents, updated| {
                    documents.replace(id, updated.clone());
                },
            )
            .await
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let Some(document) = self.find(id).await else {
            return Err(SyncError::not_found("Document", id));
        };
        let api = self.api.clone();
        let owned_id = id.to_string();
        self.optimistic
            .mutate(
                &format!("document:{id}"),
                &self.documents,
                |documents| {
                    documents.remove(id);
                },
                || async move { api.delete_document(&owned_id).await },
                |_, _| {},
            )
            .await?;

        self.summaries.write().await.remove(&document.scope_id, id);
        self.completions().forget(&completion_key(id));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Push handlers
    // ------------------------------------------------------------------

    /// `entity:progress`. Returns the completion when this event is the first
    /// terminal report for the document.
    pub async fn handle_progress(&self, payload: ProgressPayload) -> Option<ProcessingComplete> {
        let step = match payload.step.as_deref() {
            Some(raw) => {
                let parsed = ProcessingStep::parse(raw);
                if parsed.is_none() {
                    warn!(
                        "[DocumentStore] Unknown processing step '{}' for '{}'; applying the rest",
                        raw, payload.entity_id
                    );
                }
                parsed
            }
            None => None,
        };

        let scope_id = {
            let mut documents = self.documents.write().await;
            let Some(document) = documents.find_by_id(&payload.entity_id) else {
                debug!(
                    "[DocumentStore] Progress for unknown document '{}'",
                    payload.entity_id
                );
                return None;
            };

            let previous = document.progress.clone();
            let percentage = match payload.percentage {
                Some(value) => ProcessingProgress::clamp_percentage(value),
                None => previous.as_ref().map_or(0.0, |p| p.percentage),
            };
            let progress = ProcessingProgress {
                step: step.or_else(|| previous.as_ref().and_then(|p| p.step)),
                percentage,
                message: payload
                    .message
                    .clone()
                    .or_else(|| previous.as_ref().map(|p| p.message.clone()))
                    .unwrap_or_default(),
                updated_at: payload.timestamp.unwrap_or_else(Utc::now),
            };
            let status = if step.is_some_and(ProcessingStep::is_terminal) {
                DocumentStatus::Completed
            } else {
                DocumentStatus::Processing
            };
            let scope_id = payload
                .scope_id
                .clone()
                .unwrap_or_else(|| document.scope_id.clone());

            documents.update(
                &payload.entity_id,
                &DocumentPatch {
                    status: Some(status),
                    progress: Some(Some(progress)),
                    updated_at: payload.timestamp,
                    ..Default::default()
                },
            );
            scope_id
        };

        if !step.is_some_and(ProcessingStep::is_terminal) {
            return None;
        }
        if !self
            .completions()
            .observe(completion_key(&payload.entity_id))
            .is_new()
        {
            debug!(
                "[DocumentStore] Completion for '{}' already handled",
                payload.entity_id
            );
            return None;
        }

        let complete = ProcessingComplete {
            document_id: payload.entity_id,
            scope_id,
        };
        info!("[DocumentStore] Processing complete for '{}'", complete.document_id);
        self.processing_complete.notify(&complete);
        Some(complete)
    }

    /// `entity:updated` for a document. Returns the update outcome.
    pub async fn handle_updated(&self, payload: &EntityUpdatedPayload) -> UpdateOutcome {
        let mapped = map_fields(DOCUMENT_FIELDS, &payload.updates);
        if !mapped.unknown.is_empty() {
            debug!(
                "[DocumentStore] Ignoring unmapped fields {:?} for '{}'",
                mapped.unknown, payload.entity_id
            );
        }
        for (field, reason) in &mapped.invalid {
            warn!(
                "[DocumentStore] Dropping field '{}' for '{}': {}",
                field, payload.entity_id, reason
            );
        }
        if mapped.is_empty() {
            return UpdateOutcome::Unchanged;
        }

        let mut patch = mapped.patch;
        if patch.updated_at.is_none() {
            patch.updated_at = payload.timestamp;
        }
        self.documents.write().await.update(&payload.entity_id, &patch)
    }

    /// `entity:deleted`. Returns `true` when a document was removed.
    pub async fn handle_deleted(&self, payload: &EntityDeletedPayload) -> bool {
        let removed = self.documents.write().await.remove(&payload.entity_id);
        let Some(document) = removed else {
            debug!(
                "[DocumentStore] Delete for unknown document '{}'",
                payload.entity_id
            );
            return false;
        };
        let scope_id = payload.scope_id.as_deref().unwrap_or(&document.scope_id);
        self.summaries.write().await.remove(scope_id, &document.id);
        self.completions().forget(&completion_key(&document.id));
        info!(
            "[DocumentStore] Removed '{}' ({})",
            payload.name.as_deref().unwrap_or(&document.name),
            document.id
        );
        true
    }

    /// `scope-entity:created` for a document.
    pub async fn handle_created(&self, payload: &ScopeEntityPayload) -> bool {
        let Some(raw) = payload.entity.clone() else {
            warn!("[DocumentStore] scope-entity:created without entity body");
            return false;
        };
        match serde_json::from_value::<Document>(raw) {
            Ok(document) => self.documents.write().await.add(document).is_inserted(),
            Err(e) => {
                warn!("[DocumentStore] Ignoring malformed document: {}", e);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Summaries
    // ------------------------------------------------------------------

    /// Requests a summary and polls until it is ready, fails, the schedule is
    /// exhausted, or `cancel` fires.
    ///
    /// Exhausting the schedule is not an error; the last observed summary is
    /// returned (usually still `Generating`).
    pub async fn generate_summary(
        &self,
        scope_id: &str,
        document_id: &str,
        cancel: CancellationToken,
    ) -> Result<DocumentSummary> {
        self.summaries
            .write()
            .await
            .set(scope_id, document_id, DocumentSummary::generating(None));

        let job_id = match self.summary_api.request_summary(scope_id, document_id).await {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(
                    "[DocumentStore] Summary request for '{}' failed: {}",
                    document_id, e
                );
                self.summaries
                    .write()
                    .await
                    .set(scope_id, document_id, DocumentSummary::failed());
                return Err(e);
            }
        };

        let mut last = DocumentSummary::generating(Some(job_id));
        if !self.store_summary(scope_id, document_id, &last).await {
            return Err(SyncError::Cancelled);
        }

        for (attempt, delay) in self.poll_schedule.iter().enumerate() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("[DocumentStore] Summary polling for '{}' cancelled", document_id);
                    return Err(SyncError::Cancelled);
                }
                _ = tokio::time::sleep(*delay) => {}
            }

            match self.summary_api.fetch_summary(scope_id, document_id).await {
                Ok(mut summary) => {
                    if summary.job_id.is_none() {
                        summary.job_id = last.job_id.clone();
                    }
                    last = summary;
                    if !self.store_summary(scope_id, document_id, &last).await {
                        debug!(
                            "[DocumentStore] Scope '{}' torn down while polling '{}'",
                            scope_id, document_id
                        );
                        return Err(SyncError::Cancelled);
                    }
                    if last.status.is_terminal() {
                        return Ok(last);
                    }
                }
                Err(e) => warn!(
                    "[DocumentStore] Summary poll {} for '{}' failed: {}",
                    attempt + 1,
                    document_id,
                    e
                ),
            }
        }

        info!(
            "[DocumentStore] Summary for '{}' still {:?} after {} polls",
            document_id,
            last.status,
            self.poll_schedule.len()
        );
        Ok(last)
    }

    /// Fetches the current summary once and caches it.
    ///
    /// The result is dropped with [`SyncError::Cancelled`] when the document
    /// left `scope_id` while the fetch was in flight.
    pub async fn refresh_summary(&self, scope_id: &str, document_id: &str) -> Result<DocumentSummary> {
        let summary = self.summary_api.fetch_summary(scope_id, document_id).await?;

        // Held across the write so a concurrent `clear` wipes this entry too.
        let documents = self.documents.read().await;
        let owned = documents
            .find_by_id(document_id)
            .is_some_and(|document| document.scope_id == scope_id);
        if !owned {
            debug!(
                "[DocumentStore] Discarding summary for '{}'; scope '{}' was torn down",
                document_id, scope_id
            );
            return Err(SyncError::Cancelled);
        }
        self.summaries
            .write()
            .await
            .set(scope_id, document_id, summary.clone());
        Ok(summary)
    }

    /// Writes `summary` only while the entry still exists; a teardown in the
    /// meantime must not be undone by a late poll.
    async fn store_summary(&self, scope_id: &str, document_id: &str, summary: &DocumentSummary) -> bool {
        let mut summaries = self.summaries.write().await;
        match summaries.get_mut(scope_id, document_id) {
            Some(slot) => {
                *slot = summary.clone();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dealsync_core::document::SummaryStatus;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockApis {
        reject: AtomicBool,
        polls: AtomicUsize,
        ready_after: usize,
    }

    #[async_trait]
    impl DocumentApi for MockApis {
        async fn create_document(&self, draft: &Document) -> Result<Document> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(SyncError::rejected("Upload refused"));
            }
            let mut created = draft.clone();
            created.id = "srv-1".to_string();
            Ok(created)
        }

        async fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<Document> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(SyncError::rejected_without_message());
            }
            let mut document = Document::new(id, "t1", "server");
            document.name = patch.name.clone().unwrap_or_default();
            Ok(document)
        }

        async fn delete_document(&self, _id: &str) -> Result<()> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(SyncError::rejected_without_message());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SummaryApi for MockApis {
        async fn request_summary(&self, _scope_id: &str, _document_id: &str) -> Result<String> {
            Ok("job-1".to_string())
        }

        async fn fetch_summary(&self, _scope_id: &str, _document_id: &str) -> Result<DocumentSummary> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.ready_after > 0 && polls >= self.ready_after {
                return Ok(DocumentSummary {
                    status: SummaryStatus::Ready,
                    text: Some("Purchase agreement for 1 Main St".to_string()),
                    job_id: None,
                    generated_at: Some(Utc::now()),
                });
            }
            Ok(DocumentSummary::generating(None))
        }
    }

    fn schedule() -> Vec<Duration> {
        [1_000, 2_000, 3_000].into_iter().map(Duration::from_millis).collect()
    }

    fn store_with(apis: MockApis) -> (DocumentStore, Arc<MockApis>) {
        let apis = Arc::new(apis);
        (DocumentStore::new(apis.clone(), apis.clone(), schedule()), apis)
    }

    fn progress(id: &str, step: &str, percentage: f64) -> ProgressPayload {
        serde_json::from_value(json!({
            "entityId": id,
            "step": step,
            "percentage": percentage,
            "message": step
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_progress_with_unknown_step_still_updates_percentage() {
        let (store, _) = store_with(MockApis::default());
        store.set_documents(vec![Document::new("d1", "t1", "Offer.pdf")]).await;

        assert!(store.handle_progress(progress("d1", "ocr", 20.0)).await.is_none());
        assert!(store.handle_progress(progress("d1", "teleporting", 55.0)).await.is_none());

        let document = store.find("d1").await.unwrap();
        let progress = document.progress.unwrap();
        assert_eq!(progress.percentage, 55.0);
        assert_eq!(progress.step, Some(ProcessingStep::Ocr));
        assert_eq!(document.status, DocumentStatus::Processing);
    }

    #[tokio::test]
    async fn test_completion_fires_once() {
        let (store, _) = store_with(MockApis::default());
        store.set_documents(vec![Document::new("d1", "t1", "Offer.pdf")]).await;
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _registration = store.on_processing_complete(move |complete| {
            assert_eq!(complete.scope_id, "t1");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let first = store.handle_progress(progress("d1", "completed", 100.0)).await;
        let replay = store.handle_progress(progress("d1", "completed", 100.0)).await;

        assert_eq!(
            first,
            Some(ProcessingComplete {
                document_id: "d1".to_string(),
                scope_id: "t1".to_string()
            })
        );
        assert!(replay.is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(store.find("d1").await.unwrap().status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_updated_maps_snake_case_fields() {
        let (store, _) = store_with(MockApis::default());
        store.set_documents(vec![Document::new("d1", "t1", "Offer.pdf")]).await;
        let payload: EntityUpdatedPayload = serde_json::from_value(json!({
            "entityId": "d1",
            "updates": { "document_type": "purchase_agreement", "page_count": 9, "mystery": 1 }
        }))
        .unwrap();

        assert_eq!(store.handle_updated(&payload).await, UpdateOutcome::Updated);
        let document = store.find("d1").await.unwrap();
        assert_eq!(document.document_type.as_deref(), Some("purchase_agreement"));
        assert_eq!(document.page_count, Some(9));
        assert_eq!(document.name, "Offer.pdf");
    }

    #[tokio::test]
    async fn test_create_swaps_temporary_id() {
        let (store, _) = store_with(MockApis::default());
        let created = store
            .create_document(Document::new("", "t1", "Offer.pdf"))
            .await
            .unwrap();
        assert_eq!(created.id, "srv-1");
        let documents = store.documents().await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "srv-1");
    }

    #[tokio::test]
    async fn test_rejected_delete_restores_list() {
        let (store, apis) = store_with(MockApis::default());
        let a = Document::new("A", "t1", "a.pdf");
        let b = Document::new("B", "t1", "b.pdf");
        store.set_documents(vec![a.clone(), b.clone()]).await;
        apis.reject.store(true, Ordering::SeqCst);

        assert!(store.delete_document("A").await.unwrap_err().is_rejected());
        assert_eq!(*store.documents().await, vec![a, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_polling_stops_when_ready() {
        let (store, apis) = store_with(MockApis {
            ready_after: 2,
            ..Default::default()
        });

        let summary = store
            .generate_summary("t1", "d1", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.status, SummaryStatus::Ready);
        assert_eq!(summary.job_id.as_deref(), Some("job-1"));
        assert_eq!(apis.polls.load(Ordering::SeqCst), 2);
        assert_eq!(store.summary("t1", "d1").await, Some(summary));
        assert_eq!(store.summary("t2", "d1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_polling_reports_last_state_when_exhausted() {
        let (store, apis) = store_with(MockApis::default());

        let summary = store
            .generate_summary("t1", "d1", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.status, SummaryStatus::Generating);
        assert_eq!(apis.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_polling_is_cancellable() {
        let (store, apis) = store_with(MockApis::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store.generate_summary("t1", "d1", cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(apis.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_wipes_documents_and_summaries() {
        let (store, _) = store_with(MockApis {
            ready_after: 1,
            ..Default::default()
        });
        store.set_documents(vec![Document::new("d1", "t1", "Offer.pdf")]).await;
        store.refresh_summary("t1", "d1").await.unwrap();

        store.clear().await;
        assert!(store.documents().await.is_empty());
        assert_eq!(store.summary("t1", "d1").await, None);
    }
}
