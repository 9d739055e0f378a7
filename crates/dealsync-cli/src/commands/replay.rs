use super::offline::OfflineBackend;
use anyhow::{Context, Result};
use colored::Colorize;
use dealsync_application::SyncEngine;
use dealsync_core::config::SyncConfig;
use dealsync_core::conversation::ChatStateRepository;
use dealsync_core::scope::ScopeDescriptor;
use dealsync_infrastructure::{ChannelTransport, JsonChatStateRepository};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One line of a recording.
#[derive(Debug, Deserialize)]
struct RecordedEvent {
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub delivered: usize,
    /// Well-formed lines naming an event nobody subscribes to.
    pub skipped: usize,
    /// Lines that are not a recorded event at all.
    pub malformed: usize,
}

pub async fn run(
    config: &SyncConfig,
    events: &Path,
    state: Option<PathBuf>,
    transaction: Option<String>,
) -> Result<()> {
    let input = tokio::fs::read_to_string(events)
        .await
        .with_context(|| format!("Failed to read {}", events.display()))?;

    let transport = Arc::new(ChannelTransport::new());
    let repository = state.map(|path| {
        Arc::new(JsonChatStateRepository::new(path)) as Arc<dyn ChatStateRepository>
    });
    let restore = repository.is_some();
    let engine = SyncEngine::new(
        transport.clone(),
        OfflineBackend::services(),
        repository,
        config,
    );
    engine.connect();

    if restore {
        engine.chat().restore().await?;
    }
    if let Some(transaction_id) = transaction {
        engine
            .set_scope(ScopeDescriptor::transaction(transaction_id))
            .await?;
    }

    let stats = replay(&engine, &transport, &input).await;
    info!(
        "[Replay] {} delivered, {} skipped, {} malformed",
        stats.delivered, stats.skipped, stats.malformed
    );

    println!(
        "{}",
        format!(
            "Replayed {} event(s) ({} skipped, {} malformed)",
            stats.delivered, stats.skipped, stats.malformed
        )
        .bold()
    );
    print!("{}", render(&engine).await);
    engine.disconnect();
    Ok(())
}

/// Delivers every recorded line through `transport`, then lets the engine
/// apply the queue and finish its follow-ups.
pub async fn replay(engine: &SyncEngine, transport: &ChannelTransport, input: &str) -> ReplayStats {
    let mut stats = ReplayStats::default();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<RecordedEvent>(line) {
            Ok(recorded) => {
                if transport.deliver(&recorded.event, recorded.payload) {
                    stats.delivered += 1;
                } else {
                    warn!(
                        "[Replay] Line {}: no subscriber for '{}'",
                        index + 1,
                        recorded.event
                    );
                    stats.skipped += 1;
                }
            }
            Err(e) => {
                warn!("[Replay] Line {}: {}", index + 1, e);
                stats.malformed += 1;
            }
        }
    }
    engine.drain().await;
    engine.wait_for_followups().await;
    stats
}

/// Plain-text summary of every store.
pub async fn render(engine: &SyncEngine) -> String {
    let mut out = String::new();

    let documents = engine.documents().documents().await;
    out.push_str(&format!("{} ({})\n", "Documents".bold(), documents.len()));
    for document in documents.iter() {
        let progress = document
            .progress
            .as_ref()
            .map(|p| format!(" {:.0}%", p.percentage))
            .unwrap_or_default();
        out.push_str(&format!("  {}{}\n", document, progress));
    }

    let transactions = engine.transactions().transactions().await;
    out.push_str(&format!("{} ({})\n", "Transactions".bold(), transactions.len()));
    for transaction in transactions.iter() {
        out.push_str(&format!(
            "  {} ({}, {})\n",
            transaction.name, transaction.id, transaction.status
        ));
    }

    let notifications = engine.notifications().notifications().await;
    out.push_str(&format!(
        "{} ({}, {} unread)\n",
        "Notifications".bold(),
        notifications.len(),
        engine.notifications().unread_count().await
    ));
    for notification in notifications.iter() {
        let marker = if notification.read { " " } else { "•" };
        out.push_str(&format!("  {} {}  {}\n", marker, notification.id, notification.title));
    }

    let conversations = engine.chat().conversations().await;
    out.push_str(&format!(
        "{} ({}, scope {})\n",
        "Conversations".bold(),
        conversations.len(),
        engine.chat().scope_key().await
    ));
    for message in engine.chat().current_messages().await {
        out.push_str(&format!("  [{:?}] {}\n", message.sender, message.text));
    }
    if engine.chat().is_typing().await {
        out.push_str(&format!("  {}\n", "assistant is typing…".dimmed()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealsync_core::document::DocumentStatus;

    const RECORDING: &str = r#"
# notification, replayed twice
{"event": "notification:new", "payload": {"id": "n1", "type": "document_processed", "title": "Offer processed"}}
{"event": "notification:new", "payload": {"id": "n1", "type": "document_processed", "title": "Offer processed"}}
{"event": "scope-entity:created", "payload": {"entityType": "document", "entity": {"id": "d1", "scopeId": "42", "name": "Offer.pdf", "uploadedAt": "2024-05-01T10:00:00Z", "updatedAt": "2024-05-01T10:00:00Z"}}}
{"event": "entity:progress", "payload": {"entityId": "d1", "step": "completed", "percentage": 100}}
{"event": "chat:typing", "payload": {"isTyping": true}}
{"event": "chat:message", "payload": {"id": "m1", "text": "Your offer is processed.", "sender": "assistant"}}
{"event": "chat:send", "payload": {"text": "outbound only"}}
not json at all
"#;

    fn engine() -> (SyncEngine, Arc<ChannelTransport>) {
        let transport = Arc::new(ChannelTransport::new());
        let engine = SyncEngine::new(
            transport.clone(),
            OfflineBackend::services(),
            None,
            &SyncConfig::default(),
        );
        engine.connect();
        (engine, transport)
    }

    #[tokio::test]
    async fn test_replay_applies_recording() {
        let (engine, transport) = engine();
        let stats = replay(&engine, &transport, RECORDING).await;

        assert_eq!(
            stats,
            ReplayStats {
                delivered: 6,
                skipped: 1,
                malformed: 1
            }
        );
        assert_eq!(engine.notifications().notifications().await.len(), 1);
        assert_eq!(engine.notifications().unread_count().await, 1);

        let document = engine.documents().find("d1").await.unwrap();
        assert_eq!(document.status, DocumentStatus::Completed);

        let messages = engine.chat().current_messages().await;
        assert_eq!(messages.len(), 1);
        assert!(!engine.chat().is_typing().await);
    }

    #[tokio::test]
    async fn test_render_lists_every_store() {
        colored::control::set_override(false);
        let (engine, transport) = engine();
        replay(&engine, &transport, RECORDING).await;

        let out = render(&engine).await;
        assert!(out.contains("Documents (1)"));
        assert!(out.contains("Notifications (1, 1 unread)"));
        assert!(out.contains("Conversations (1, scope global)"));
        assert!(out.contains("[Assistant] Your offer is processed."));
    }
}
