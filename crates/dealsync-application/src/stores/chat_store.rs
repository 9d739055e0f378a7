//! Chat store.
//!
//! Owns conversations, the current conversation, the scope → conversation
//! table and the context router. Outgoing messages go over the transport as
//! `chat:send`; replies arrive as `chat:message` pushes.

use chrono::Utc;
use dealsync_core::conversation::{
    ChatStateRepository, Conversation, ConversationPatch, Message, PersistedChat, Sender,
};
use dealsync_core::entity::{EntityStore, UpdateOutcome};
use dealsync_core::error::{Result, SyncError};
use dealsync_core::events::{ChatMessagePayload, ChatSendPayload, EventName};
use dealsync_core::scope::{
    ContextRouter, ScopeConversationMap, ScopeDescriptor, ScopeKey, ScopeTransition,
};
use dealsync_core::transport::Transport;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub conversations: EntityStore<Conversation>,
    pub current_conversation_id: Option<String>,
    pub scope_map: ScopeConversationMap,
    pub router: ContextRouter,
    pub is_typing: bool,
}

impl ChatState {
    fn current(&self) -> Option<&Conversation> {
        self.current_conversation_id
            .as_deref()
            .and_then(|id| self.conversations.find_by_id(id))
    }

    /// Returns the current conversation id, creating and binding a
    /// conversation for the current scope when there is none.
    fn ensure_conversation(&mut self) -> String {
        if let Some(current) = self.current() {
            return current.id.clone();
        }
        let conversation = Conversation::new();
        let id = conversation.id.clone();
        self.conversations.add(conversation);
        self.current_conversation_id = Some(id.clone());
        self.scope_map.bind(self.router.key().clone(), id.clone());
        info!(
            "[ChatStore] Created conversation '{}' for scope '{}'",
            id,
            self.router.key()
        );
        id
    }

    fn push(&mut self, conversation_id: &str, message: Message) -> bool {
        self.conversations
            .modify(conversation_id, |conversation| conversation.push_message(message))
            == UpdateOutcome::Updated
    }

    fn remove_message(&mut self, conversation_id: &str, message_id: &str) {
        self.conversations.modify(conversation_id, |conversation| {
            let before = conversation.messages.len();
            conversation.messages.retain(|m| m.id != message_id);
            conversation.messages.len() != before
        });
    }

    fn to_persisted(&self) -> PersistedChat {
        PersistedChat {
            conversations: self.conversations.iter().cloned().collect(),
            current_conversation_id: self.current_conversation_id.clone(),
            scope_conversations: self.scope_map.to_raw(),
        }
    }
}

pub struct ChatStore {
    state: RwLock<ChatState>,
    transport: Arc<dyn Transport>,
    repository: Option<Arc<dyn ChatStateRepository>>,
}

impl ChatStore {
    pub fn new(
        transport: Arc<dyn Transport>,
        repository: Option<Arc<dyn ChatStateRepository>>,
    ) -> Self {
        Self {
            state: RwLock::new(ChatState::default()),
            transport,
            repository,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub async fn conversations(&self) -> Arc<Vec<Conversation>> {
        self.state.read().await.conversations.list()
    }

    pub async fn current_conversation(&self) -> Option<Conversation> {
        self.state.read().await.current().cloned()
    }

    pub async fn current_conversation_id(&self) -> Option<String> {
        self.state.read().await.current_conversation_id.clone()
    }

    pub async fn current_messages(&self) -> Vec<Message> {
        self.state
            .read()
            .await
            .current()
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub async fn is_typing(&self) -> bool {
        self.state.read().await.is_typing
    }

    pub async fn scope_key(&self) -> ScopeKey {
        self.state.read().await.router.key().clone()
    }

    pub async fn scope_descriptor(&self) -> ScopeDescriptor {
        self.state.read().await.router.descriptor().clone()
    }

    pub async fn selection(&self) -> Option<String> {
        self.state.read().await.router.selection().map(str::to_string)
    }

    pub async fn scope_map(&self) -> ScopeConversationMap {
        self.state.read().await.scope_map.clone()
    }

    pub async fn snapshot(&self) -> PersistedChat {
        self.state.read().await.to_persisted()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Loads persisted chat state. Returns `false` when nothing was stored.
    pub async fn restore(&self) -> Result<bool> {
        let Some(repository) = &self.repository else {
            return Ok(false);
        };
        let Some(mut persisted) = repository.load().await? else {
            return Ok(false);
        };

        let dropped = persisted.prune_dangling();
        if dropped > 0 {
            warn!("[ChatStore] Dropped {} dangling conversation references", dropped);
        }

        let mut state = self.state.write().await;
        state.conversations.set(persisted.conversations);
        state.current_conversation_id = persisted.current_conversation_id;
        state.scope_map = ScopeConversationMap::from_raw(&persisted.scope_conversations);
        info!(
            "[ChatStore] Restored {} conversations",
            state.conversations.len()
        );
        Ok(true)
    }

    async fn persist(&self) {
        let Some(repository) = &self.repository else {
            return;
        };
        let snapshot = self.snapshot().await;
        if let Err(e) = repository.save(&snapshot).await {
            warn!("[ChatStore] Failed to persist chat state: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Outgoing
    // ------------------------------------------------------------------

    /// Sends a user message in the current conversation.
    ///
    /// A conversation is created lazily for the current scope. When the
    /// transport is down nothing is sent; a local system notice is appended
    /// instead and `TransportUnavailable` is returned.
    pub async fn send_message(&self, text: &str) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::invalid_payload(
                EventName::ChatSend.as_str(),
                "message text is empty",
            ));
        }

        let (conversation_id, message, payload) = {
            let mut state = self.state.write().await;
            let conversation_id = state.ensure_conversation();

            if !self.transport.is_connected() {
                let err = SyncError::TransportUnavailable;
                let notice = Message::system(err.user_message()).in_conversation(&conversation_id);
                state.push(&conversation_id, notice);
                drop(state);
                self.persist().await;
                return Err(err);
            }

            let message = Message::user(text).in_conversation(&conversation_id);
            state.push(&conversation_id, message.clone());
            state.is_typing = true;

            let payload = ChatSendPayload {
                conversation_id: conversation_id.clone(),
                message_id: message.id.clone(),
                text: message.text.clone(),
                scope_key: state.router.key().to_string(),
                transaction_id: state.router.descriptor().transaction_id().map(str::to_string),
                document_id: state.router.selection().map(str::to_string),
                timestamp: message.timestamp,
            };
            (conversation_id, message, payload)
        };

        let emitted = serde_json::to_value(&payload)
            .map_err(SyncError::from)
            .and_then(|value| self.transport.emit(EventName::ChatSend.as_str(), value));

        if let Err(err) = emitted {
            warn!("[ChatStore] chat:send failed, rolling back: {}", err);
            let mut state = self.state.write().await;
            state.remove_message(&conversation_id, &message.id);
            state.is_typing = false;
            let notice = Message::system(err.user_message()).in_conversation(&conversation_id);
            state.push(&conversation_id, notice);
            drop(state);
            self.persist().await;
            return Err(err);
        }

        self.persist().await;
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Push handlers
    // ------------------------------------------------------------------

    /// `chat:message`. Returns `true` when the message was appended.
    pub async fn handle_message(&self, payload: ChatMessagePayload) -> bool {
        let message = payload.into_message(Utc::now());
        let appended = {
            let mut state = self.state.write().await;
            let target = match message.conversation_id.as_deref() {
                Some(id) if state.conversations.contains(id) => id.to_string(),
                Some(id) => {
                    warn!(
                        "[ChatStore] Message '{}' names unknown conversation '{}'; using current",
                        message.id, id
                    );
                    state.ensure_conversation()
                }
                None => state.ensure_conversation(),
            };

            let from_assistant = message.sender == Sender::Assistant;
            let message_id = message.id.clone();
            let appended = state.push(&target, message);
            if !appended {
                debug!("[ChatStore] Ignoring duplicate message '{}'", message_id);
            }
            if from_assistant {
                state.is_typing = false;
            }
            appended
        };

        if appended {
            self.persist().await;
        }
        appended
    }

    /// `chat:typing`.
    pub async fn handle_typing(&self, is_typing: bool) {
        self.state.write().await.is_typing = is_typing;
    }

    // ------------------------------------------------------------------
    // Conversation management
    // ------------------------------------------------------------------

    /// Starts a fresh conversation for the current scope.
    pub async fn new_conversation(&self) -> Conversation {
        let conversation = Conversation::new();
        {
            let mut state = self.state.write().await;
            state.conversations.add(conversation.clone());
            state.current_conversation_id = Some(conversation.id.clone());
            let key = state.router.key().clone();
            state.scope_map.bind(key, conversation.id.clone());
            state.is_typing = false;
        }
        self.persist().await;
        conversation
    }

    /// Makes `id` the current conversation and binds it to the current scope.
    pub async fn select_conversation(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !state.conversations.contains(id) {
                return Err(SyncError::not_found("Conversation", id));
            }
            state.current_conversation_id = Some(id.to_string());
            let key = state.router.key().clone();
            state.scope_map.bind(key, id);
            state.is_typing = false;
        }
        self.persist().await;
        Ok(())
    }

    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        let patch = ConversationPatch {
            title: Some(title.trim().to_string()),
        };
        let outcome = self.state.write().await.conversations.update(id, &patch);
        if outcome == UpdateOutcome::Missing {
            return Err(SyncError::not_found("Conversation", id));
        }
        if outcome == UpdateOutcome::Updated {
            self.persist().await;
        }
        Ok(())
    }

    /// Empties the messages of `id`; the conversation and its scope bindings stay.
    pub async fn clear_conversation(&self, id: &str) -> Result<()> {
        let outcome = self
            .state
            .write()
            .await
            .conversations
            .modify(id, Conversation::clear_messages);
        match outcome {
            UpdateOutcome::Missing => Err(SyncError::not_found("Conversation", id)),
            UpdateOutcome::Updated => {
                self.persist().await;
                Ok(())
            }
            UpdateOutcome::Unchanged => Ok(()),
        }
    }

    /// Deletes `id`, its scope bindings, and resets the current conversation
    /// if it was active.
    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.conversations.remove(id).is_none() {
                return Err(SyncError::not_found("Conversation", id));
            }
            let unbound = state.scope_map.remove_conversation(id);
            if state.current_conversation_id.as_deref() == Some(id) {
                state.current_conversation_id = None;
                state.is_typing = false;
            }
            info!(
                "[ChatStore] Deleted conversation '{}' ({} scope bindings removed)",
                id, unbound
            );
        }
        self.persist().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scope routing
    // ------------------------------------------------------------------

    /// Routes the store to `descriptor`.
    pub async fn set_scope(&self, descriptor: ScopeDescriptor) -> ScopeTransition {
        let transition = {
            let mut state = self.state.write().await;
            let ChatState {
                router, scope_map, ..
            } = &mut *state;
            let transition = router.set_scope(descriptor, scope_map);
            if let ScopeTransition::Switched {
                previous,
                conversation_id,
            } = &transition
            {
                debug!(
                    "[ChatStore] Scope '{}' -> '{}' (conversation: {:?})",
                    previous,
                    state.router.key(),
                    conversation_id
                );
                state.current_conversation_id = conversation_id.clone();
                state.is_typing = false;
            }
            transition
        };

        if transition.is_switch() {
            self.persist().await;
        }
        transition
    }

    pub async fn select_resource(&self, resource_id: Option<String>) {
        self.state.write().await.router.select_resource(resource_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealsync_core::transport::EventHandler;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingTransport {
        offline: AtomicBool,
        emitted: Mutex<Vec<(String, Value)>>,
    }

    impl Transport for RecordingTransport {
        fn subscribe(&self, _event: &str, _handler: EventHandler) {}
        fn unsubscribe(&self, _event: &str) {}
        fn emit(&self, event: &str, payload: Value) -> Result<()> {
            self.emitted.lock().unwrap().push((event.to_string(), payload));
            Ok(())
        }
        fn is_connected(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }
    }

    fn store() -> (ChatStore, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        (ChatStore::new(transport.clone(), None), transport)
    }

    #[tokio::test]
    async fn test_send_creates_conversation_lazily() {
        let (store, transport) = store();
        assert!(store.current_conversation().await.is_none());

        let message = store.send_message("Hello").await.unwrap();
        let conversation = store.current_conversation().await.unwrap();

        assert_eq!(store.conversations().await.len(), 1);
        assert_eq!(conversation.messages, vec![message.clone()]);
        assert_eq!(conversation.title, "Hello");
        assert!(store.is_typing().await);
        assert_eq!(
            store.scope_map().await.get(&ScopeKey::global()),
            Some(conversation.id.as_str())
        );

        let emitted = transport.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "chat:send");
        assert_eq!(emitted[0].1["text"], "Hello");
        assert_eq!(emitted[0].1["conversationId"], conversation.id.as_str());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_adds_system_notice() {
        let (store, transport) = store();
        transport.offline.store(true, Ordering::SeqCst);

        let err = store.send_message("Hello").await.unwrap_err();
        assert!(err.is_transport_unavailable());

        let messages = store.current_messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::System);
        assert!(!store.is_typing().await);
        assert!(transport.emitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (store, _) = store();
        assert!(store.send_message("   ").await.is_err());
        assert!(store.conversations().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_push_is_ignored() {
        let (store, _) = store();
        let payload: ChatMessagePayload =
            serde_json::from_value(serde_json::json!({ "id": "m1", "text": "Hi", "sender": "assistant" }))
                .unwrap();

        assert!(store.handle_message(payload.clone()).await);
        assert!(!store.handle_message(payload).await);
        assert_eq!(store.current_messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_resets_current_and_bindings() {
        let (store, _) = store();
        let conversation = store.new_conversation().await;
        store.set_scope(ScopeDescriptor::transaction("7")).await;
        store.select_conversation(&conversation.id).await.unwrap();
        assert_eq!(store.scope_map().await.len(), 2);

        store.delete_conversation(&conversation.id).await.unwrap();
        assert!(store.current_conversation_id().await.is_none());
        assert!(store.scope_map().await.is_empty());
        assert!(store.delete_conversation(&conversation.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_clear_keeps_conversation() {
        let (store, _) = store();
        store.send_message("Hello").await.unwrap();
        let id = store.current_conversation_id().await.unwrap();

        store.clear_conversation(&id).await.unwrap();
        assert!(store.current_messages().await.is_empty());
        assert_eq!(store.current_conversation_id().await, Some(id));
    }

    #[tokio::test]
    async fn test_rename_unknown_conversation() {
        let (store, _) = store();
        let err = store.rename_conversation("missing", "x").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
