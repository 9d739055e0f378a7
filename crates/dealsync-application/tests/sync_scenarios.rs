mod support;

use dealsync_core::conversation::{Conversation, PersistedChat, Sender};
use dealsync_core::document::{Document, SummaryStatus};
use dealsync_core::events::EventName;
use dealsync_core::notification::{Notification, NotificationPriority, ScopeRefs};
use dealsync_core::scope::{ScopeDescriptor, ScopeKey, ScopeTransition};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use support::{harness, harness_with, MemoryChatRepository};
use tokio_util::sync::CancellationToken;

fn unread(id: &str) -> Notification {
    Notification {
        id: id.to_string(),
        kind: "general".to_string(),
        title: id.to_string(),
        message: String::new(),
        scope_refs: ScopeRefs::default(),
        read: false,
        read_at: None,
        priority: NotificationPriority::Normal,
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_end_to_end_chat_round_trip() {
    let h = harness();

    let sent = h.engine.chat().send_message("Hello").await.unwrap();
    let conversations = h.engine.chat().conversations().await;
    assert_eq!(conversations.len(), 1);
    let conversation = &conversations[0];
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].sender, Sender::User);
    assert_eq!(conversation.messages[0].text, "Hello");
    assert!(h.engine.chat().is_typing().await);
    assert_eq!(h.transport.emitted()[0].0, "chat:send");

    assert!(h.transport.deliver(
        "chat:message",
        json!({ "id": "reply-1", "text": "Hi! How can I help?", "sender": "assistant" })
    ));
    assert_eq!(h.engine.drain().await, 1);

    let conversations = h.engine.chat().conversations().await;
    assert_eq!(conversations.len(), 1);
    let messages = &conversations[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, sent.id);
    assert_eq!(messages[1].sender, Sender::Assistant);
    assert!(!h.engine.chat().is_typing().await);
}

#[tokio::test]
async fn test_replay_after_reconnect_is_a_no_op() {
    let h = harness();
    let notification = json!({ "id": "n1", "type": "general", "title": "Offer signed" });
    let message = json!({ "id": "m1", "text": "Welcome back", "sender": "assistant" });

    h.transport.deliver("notification:new", notification.clone());
    h.transport.deliver("chat:message", message.clone());
    h.engine.drain().await;

    h.engine.connect();
    assert_eq!(h.transport.handler_count(), EventName::INBOUND.len());
    assert_eq!(h.transport.unsubscribe_calls(), EventName::INBOUND.len());

    h.transport.deliver("notification:new", notification);
    h.transport.deliver("chat:message", message);
    assert_eq!(h.engine.drain().await, 2);

    assert_eq!(h.engine.notifications().notifications().await.len(), 1);
    assert_eq!(h.engine.notifications().unread_count().await, 1);
    assert_eq!(h.engine.chat().current_messages().await.len(), 1);
}

#[tokio::test]
async fn test_disconnect_unsubscribes_everything() {
    let h = harness();
    assert!(h.engine.is_bound());
    assert!(h.engine.disconnect());
    assert_eq!(h.transport.handler_count(), 0);
    assert!(!h.transport.deliver("chat:typing", json!({ "isTyping": true })));
    assert!(!h.engine.disconnect());
}

#[tokio::test]
async fn test_rollback_restores_exact_list() {
    let h = harness();
    let a = Document::new("A", "42", "a.pdf");
    let b = Document::new("B", "42", "b.pdf");
    h.engine.documents().set_documents(vec![a.clone(), b.clone()]).await;
    h.backend.reject_all(true);

    let err = h.engine.documents().delete_document("A").await.unwrap_err();
    assert_eq!(err.user_message(), "Request refused by server");
    assert_eq!(*h.engine.documents().documents().await, vec![a, b]);
    assert!(!h.engine.documents().is_mutation_in_flight());
}

#[tokio::test]
async fn test_scope_switch_routes_to_mapped_conversations() {
    let c1 = Conversation {
        id: "c1".to_string(),
        ..Conversation::new()
    };
    let c2 = Conversation {
        id: "c2".to_string(),
        ..Conversation::new()
    };
    let repository = MemoryChatRepository::with(PersistedChat {
        conversations: vec![c1, c2],
        current_conversation_id: Some("c1".to_string()),
        scope_conversations: BTreeMap::from([
            ("global".to_string(), "c1".to_string()),
            ("scope:42".to_string(), "c2".to_string()),
        ]),
    });
    let h = harness_with(Some(repository));
    assert!(h.engine.chat().restore().await.unwrap());

    let transition = h
        .engine
        .set_scope(ScopeDescriptor::transaction("42"))
        .await
        .unwrap();
    assert!(transition.is_switch());
    assert_eq!(h.engine.chat().current_conversation_id().await.as_deref(), Some("c2"));
    assert_eq!(
        h.engine.scope_token().await.unwrap().scope_key,
        ScopeKey::for_transaction("42")
    );

    h.engine.set_scope(ScopeDescriptor::global()).await.unwrap();
    assert_eq!(h.engine.chat().current_conversation_id().await.as_deref(), Some("c1"));

    h.engine
        .set_scope(ScopeDescriptor::transaction("99"))
        .await
        .unwrap();
    assert_eq!(h.engine.chat().current_conversation_id().await, None);
    assert_eq!(h.engine.chat().selection().await, None);
}

#[tokio::test]
async fn test_selection_change_keeps_conversation_and_skips_token_refresh() {
    let h = harness();
    h.engine
        .set_scope(ScopeDescriptor::transaction("42"))
        .await
        .unwrap();
    h.engine.chat().send_message("About this deal").await.unwrap();
    let conversation = h.engine.chat().current_conversation_id().await;

    let transition = h
        .engine
        .set_scope(ScopeDescriptor::Transaction {
            transaction_id: "42".to_string(),
            selected_document_id: Some("doc-1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(transition, ScopeTransition::DetailOnly);
    assert_eq!(h.engine.chat().current_conversation_id().await, conversation);
    assert_eq!(h.engine.chat().selection().await.as_deref(), Some("doc-1"));
    assert_eq!(h.backend.scope_switches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_scope_switch_changes_nothing() {
    let h = harness();
    h.backend.reject_all(true);

    assert!(h
        .engine
        .set_scope(ScopeDescriptor::transaction("42"))
        .await
        .is_err());
    assert!(h.engine.chat().scope_key().await.is_global());
    assert!(h.engine.scope_token().await.is_none());
}

#[tokio::test]
async fn test_scope_switch_tears_down_documents() {
    let h = harness();
    h.engine
        .documents()
        .set_documents(vec![Document::new("d1", "42", "Offer.pdf")])
        .await;
    h.engine.documents().refresh_summary("42", "d1").await.unwrap();

    h.engine
        .set_scope(ScopeDescriptor::transaction("43"))
        .await
        .unwrap();
    assert!(h.engine.documents().documents().await.is_empty());
    assert_eq!(h.engine.documents().summary("42", "d1").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_self_echo_window() {
    let h = harness();
    let notifications = h.engine.notifications();
    notifications.set_notifications(vec![unread("n1"), unread("n2")]).await;

    notifications.mark_local_change("n1");
    h.transport.deliver("notification:read", json!({ "id": "n1" }));
    h.engine.drain().await;
    assert_eq!(notifications.unread_count().await, 2);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(!notifications.is_echo_marked("n1"));

    h.transport.deliver("notification:read", json!({ "id": "n1" }));
    h.engine.drain().await;
    assert_eq!(notifications.unread_count().await, 1);
}

#[tokio::test]
async fn test_completion_schedules_summary_refresh() {
    let h = harness();
    h.engine
        .documents()
        .set_documents(vec![Document::new("d1", "42", "Offer.pdf")])
        .await;

    h.transport.deliver(
        "entity:progress",
        json!({ "entityId": "d1", "step": "completed", "percentage": 100 }),
    );
    h.transport.deliver(
        "entity:progress",
        json!({ "entityId": "d1", "step": "completed", "percentage": 100 }),
    );
    h.engine.drain().await;
    h.engine.wait_for_followups().await;

    let summary = h.engine.documents().summary("42", "d1").await.unwrap();
    assert_eq!(summary.status, SummaryStatus::Ready);
    assert_eq!(
        h.backend
            .summary_fetches
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_late_summary_refresh_does_not_refill_torn_down_scope() {
    let h = harness();
    h.backend
        .hold_summaries
        .store(true, std::sync::atomic::Ordering::SeqCst);
    h.engine
        .documents()
        .set_documents(vec![Document::new("d1", "42", "Offer.pdf")])
        .await;

    h.transport.deliver(
        "entity:progress",
        json!({ "entityId": "d1", "step": "completed", "percentage": 100 }),
    );
    h.engine.drain().await;

    h.engine
        .set_scope(ScopeDescriptor::transaction("43"))
        .await
        .unwrap();
    h.backend.summary_release.notify_one();
    h.engine.wait_for_followups().await;

    assert_eq!(h.engine.documents().summary("42", "d1").await, None);
    assert!(h.engine.documents().documents().await.is_empty());
}

#[tokio::test]
async fn test_malformed_events_do_not_stop_the_loop() {
    let h = harness();
    h.transport.deliver("entity:progress", json!({ "percentage": 10 }));
    h.transport.deliver("notification:read", json!("not an object"));
    h.transport.deliver("chat:typing", json!({ "isTyping": true }));

    assert_eq!(h.engine.drain().await, 3);
    assert!(h.engine.chat().is_typing().await);
}

#[tokio::test]
async fn test_scope_entity_events_reach_their_stores() {
    let h = harness();
    h.transport.deliver(
        "scope-entity:created",
        json!({
            "entityType": "document",
            "entity": {
                "id": "d9",
                "scopeId": "42",
                "name": "Inspection.pdf",
                "uploadedAt": "2024-05-01T10:00:00Z",
                "updatedAt": "2024-05-01T10:00:00Z"
            }
        }),
    );
    h.transport.deliver(
        "entity:updated",
        json!({ "entityId": "d9", "updates": { "page_count": 4 } }),
    );
    h.transport.deliver(
        "scope-entity:created",
        json!({
            "entityType": "transaction",
            "entity": { "id": "42", "name": "1 Main St", "updatedAt": "2024-05-01T10:00:00Z" }
        }),
    );
    h.transport.deliver(
        "entity:updated",
        json!({ "entityId": "42", "updates": { "closing_date": "2024-07-01" } }),
    );
    h.engine.drain().await;

    let document = h.engine.documents().find("d9").await.unwrap();
    assert_eq!(document.page_count, Some(4));
    let transaction = h.engine.transactions().find("42").await.unwrap();
    assert_eq!(
        transaction.closing_date,
        chrono::NaiveDate::from_ymd_opt(2024, 7, 1)
    );

    h.transport.deliver(
        "scope-entity:deleted",
        json!({ "entityType": "document", "entityId": "d9", "scopeId": "42" }),
    );
    h.engine.drain().await;
    assert!(h.engine.documents().find("d9").await.is_none());
}

#[tokio::test]
async fn test_run_loop_stops_on_cancel() {
    let h = Arc::new(harness());
    let cancel = CancellationToken::new();

    let runner = {
        let h = h.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { h.engine.run(cancel).await })
    };

    h.transport.deliver("chat:typing", json!({ "isTyping": true }));
    while !h.engine.chat().is_typing().await {
        tokio::task::yield_now().await;
    }
    cancel.cancel();
    assert_eq!(runner.await.unwrap(), 1);
}

#[tokio::test]
async fn test_chat_state_is_persisted() {
    let repository = Arc::new(MemoryChatRepository::default());
    let h = harness_with(Some(repository.clone()));

    h.engine.chat().send_message("Persist me").await.unwrap();
    let saved = repository.state.lock().unwrap().clone().unwrap();
    assert_eq!(saved.conversations.len(), 1);
    assert_eq!(
        saved.scope_conversations.get("global"),
        saved.current_conversation_id.as_ref()
    );
}
