//! Transaction store.

use crate::optimistic::OptimisticController;
use dealsync_core::api::TransactionApi;
use dealsync_core::entity::{EntityStore, UpdateOutcome};
use dealsync_core::error::{Result, SyncError};
use dealsync_core::events::{map_fields, EntityUpdatedPayload, ScopeEntityPayload, TRANSACTION_FIELDS};
use dealsync_core::transaction::{Transaction, TransactionPatch};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct TransactionStore {
    transactions: RwLock<EntityStore<Transaction>>,
    optimistic: OptimisticController,
    api: Arc<dyn TransactionApi>,
}

impl TransactionStore {
    pub fn new(api: Arc<dyn TransactionApi>) -> Self {
        Self {
            transactions: RwLock::new(EntityStore::new()),
            optimistic: OptimisticController::new(),
            api,
        }
    }

    pub async fn set_transactions(&self, transactions: Vec<Transaction>) -> bool {
        self.transactions.write().await.set(transactions)
    }

    pub async fn transactions(&self) -> Arc<Vec<Transaction>> {
        self.transactions.read().await.list()
    }

    pub async fn find(&self, id: &str) -> Option<Transaction> {
        self.transactions.read().await.find_by_id(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.transactions.read().await.contains(id)
    }

    pub async fn update_transaction(&self, id: &str, patch: TransactionPatch) -> Result<Transaction> {
        if !self.contains(id).await {
            return Err(SyncError::not_found("Transaction", id));
        }
        let api = self.api.clone();
        let owned_id = id.to_string();
        let remote_patch = patch.clone();
        self.optimistic
            .mutate(
                &format!("transaction:{id}"),
                &self.transactions,
                |transactions| {
                    transactions.update(id, &patch);
                },
                || async move { api.update_transaction(&owned_id, &remote_patch).await },
                |transactions, confirmed| {
                    transactions.replace(id, confirmed.clone());
                },
            )
            .await
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<()> {
        if !self.contains(id).await {
            return Err(SyncError::not_found("Transaction", id));
        }
        let api = self.api.clone();
        let owned_id = id.to_string();
        self.optimistic
            .mutate(
                &format!("transaction:{id}"),
                &self.transactions,
                |transactions| {
                    transactions.remove(id);
                },
                || async move { api.delete_transaction(&owned_id).await },
                |_, _| {},
            )
            .await
    }

    async fn apply_updates(
        &self,
        id: &str,
        updates: &Map<String, Value>,
        timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> UpdateOutcome {
        let mapped = map_fields(TRANSACTION_FIELDS, updates);
        for (field, reason) in &mapped.invalid {
            warn!("[TransactionStore] Dropping field '{}' for '{}': {}", field, id, reason);
        }
        if !mapped.unknown.is_empty() {
            debug!("[TransactionStore] Ignoring unmapped fields {:?}", mapped.unknown);
        }
        if mapped.is_empty() {
            return UpdateOutcome::Unchanged;
        }
        let mut patch = mapped.patch;
        if patch.updated_at.is_none() {
            patch.updated_at = timestamp;
        }
        self.transactions.write().await.update(id, &patch)
    }

    /// `entity:updated` addressed to a transaction.
    pub async fn handle_updated(&self, payload: &EntityUpdatedPayload) -> UpdateOutcome {
        self.apply_updates(&payload.entity_id, &payload.updates, payload.timestamp)
            .await
    }

    /// `scope-entity:created` for a transaction.
    pub async fn handle_created(&self, payload: &ScopeEntityPayload) -> bool {
        let Some(raw) = payload.entity.clone() else {
            warn!("[TransactionStore] scope-entity:created without entity body");
            return false;
        };
        match serde_json::from_value::<Transaction>(raw) {
            Ok(transaction) => self.transactions.write().await.add(transaction).is_inserted(),
            Err(e) => {
                warn!("[TransactionStore] Ignoring malformed transaction: {}", e);
                false
            }
        }
    }

    /// `scope-entity:updated` for a transaction.
    pub async fn handle_scope_updated(&self, payload: &ScopeEntityPayload) -> UpdateOutcome {
        let Some(id) = payload.resolved_id() else {
            warn!("[TransactionStore] scope-entity:updated without id");
            return UpdateOutcome::Missing;
        };
        self.apply_updates(&id, &payload.updates, payload.timestamp).await
    }

    /// `scope-entity:deleted` for a transaction.
    pub async fn handle_scope_deleted(&self, payload: &ScopeEntityPayload) -> bool {
        let Some(id) = payload.resolved_id() else {
            warn!("[TransactionStore] scope-entity:deleted without id");
            return false;
        };
        self.transactions.write().await.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dealsync_core::transaction::TransactionStatus;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockApi {
        reject: AtomicBool,
    }

    #[async_trait]
    impl TransactionApi for MockApi {
        async fn update_transaction(&self, id: &str, patch: &TransactionPatch) -> Result<Transaction> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(SyncError::rejected("Closed transactions are read-only"));
            }
            let mut confirmed = Transaction::new(id, "confirmed");
            if let Some(status) = patch.status {
                confirmed.status = status;
            }
            Ok(confirmed)
        }

        async fn delete_transaction(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn store() -> (TransactionStore, Arc<MockApi>) {
        let api = Arc::new(MockApi::default());
        (TransactionStore::new(api.clone()), api)
    }

    #[tokio::test]
    async fn test_update_reconciles_server_record() {
        let (store, _) = store();
        store.set_transactions(vec![Transaction::new("42", "Main St")]).await;

        let patch = TransactionPatch {
            status: Some(TransactionStatus::Active),
            ..Default::default()
        };
        store.update_transaction("42", patch).await.unwrap();

        let transaction = store.find("42").await.unwrap();
        assert_eq!(transaction.name, "confirmed");
        assert_eq!(transaction.status, TransactionStatus::Active);
    }

    #[tokio::test]
    async fn test_rejected_update_rolls_back() {
        let (store, api) = store();
        let original = Transaction::new("42", "Main St");
        store.set_transactions(vec![original.clone()]).await;
        api.reject.store(true, Ordering::SeqCst);

        let err = store
            .update_transaction(
                "42",
                TransactionPatch {
                    name: Some("Elm St".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Closed transactions are read-only");
        assert_eq!(store.find("42").await, Some(original));
    }

    #[tokio::test]
    async fn test_scope_entity_lifecycle() {
        let (store, _) = store();
        let created: ScopeEntityPayload = serde_json::from_value(json!({
            "entityType": "transaction",
            "entity": {
                "id": "7",
                "name": "Oak Ave",
                "updatedAt": "2024-05-01T10:00:00Z"
            }
        }))
        .unwrap();
        assert!(store.handle_created(&created).await);
        assert!(!store.handle_created(&created).await);

        let updated: ScopeEntityPayload = serde_json::from_value(json!({
            "entityType": "transaction",
            "entityId": "7",
            "updates": { "status": "closed", "price": 525000.0 }
        }))
        .unwrap();
        assert_eq!(store.handle_scope_updated(&updated).await, UpdateOutcome::Updated);
        let transaction = store.find("7").await.unwrap();
        assert_eq!(transaction.status, TransactionStatus::Closed);
        assert_eq!(transaction.price, Some(525000.0));

        assert!(store.handle_scope_deleted(&updated).await);
        assert!(store.transactions().await.is_empty());
    }
}
