use super::state_file;
use anyhow::{Context, Result};
use colored::Colorize;
use dealsync_core::config::SyncConfig;
use dealsync_core::conversation::PersistedChat;
use dealsync_infrastructure::storage::{JsonChatStateRepository, LoadOutcome};
use std::path::PathBuf;

pub async fn run(config: &SyncConfig, file: Option<PathBuf>) -> Result<()> {
    let path = state_file(config, file)?;
    let repository = JsonChatStateRepository::new(&path).read_only();

    let report = repository
        .load_report()
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let Some(report) = report else {
        println!("{}", format!("Nothing stored at {}", path.display()).dimmed());
        return Ok(());
    };

    match &report.outcome {
        LoadOutcome::Current => {}
        LoadOutcome::Migrated { from } => {
            println!("{}", format!("Stored at version {} (needs migration)", from).yellow());
        }
        LoadOutcome::Reset { reason } => {
            println!("{}", format!("Unsupported snapshot: {}", reason).red());
            return Ok(());
        }
    }
    print!("{}", render(&report.state));
    Ok(())
}

pub fn render(state: &PersistedChat) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Conversations".bold()));
    if state.conversations.is_empty() {
        out.push_str("  (none)\n");
    }
    for conversation in &state.conversations {
        let marker = if state.current_conversation_id.as_deref() == Some(conversation.id.as_str()) {
            "*"
        } else {
            " "
        };
        out.push_str(&format!(
            "{} {}  {}  {} message(s), updated {}\n",
            marker,
            conversation.id,
            conversation.title,
            conversation.messages.len(),
            conversation.updated_at.format("%Y-%m-%d %H:%M")
        ));
    }

    out.push_str(&format!("{}\n", "Scope map".bold()));
    if state.scope_conversations.is_empty() {
        out.push_str("  (empty)\n");
    }
    for (scope_key, conversation_id) in &state.scope_conversations {
        out.push_str(&format!("  {} -> {}\n", scope_key, conversation_id));
    }
    out
}
