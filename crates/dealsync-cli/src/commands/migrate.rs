use super::state_file;
use anyhow::{Context, Result};
use colored::Colorize;
use dealsync_core::config::SyncConfig;
use dealsync_core::conversation::ChatStateRepository;
use dealsync_infrastructure::dto::CURRENT_CHAT_STATE_VERSION;
use dealsync_infrastructure::storage::{JsonChatStateRepository, LoadOutcome};
use std::path::PathBuf;

pub async fn run(config: &SyncConfig, file: Option<PathBuf>) -> Result<()> {
    let path = state_file(config, file)?;
    let repository = JsonChatStateRepository::new(&path);

    let report = repository
        .load_report()
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let Some(report) = report else {
        println!("{}", format!("Nothing stored at {}", path.display()).dimmed());
        return Ok(());
    };

    match report.outcome {
        LoadOutcome::Current => {
            println!(
                "{} is already at version {}",
                path.display(),
                CURRENT_CHAT_STATE_VERSION
            );
        }
        LoadOutcome::Migrated { from } => {
            repository.save(&report.state).await?;
            println!(
                "{}",
                format!(
                    "Migrated {} from {} to {}",
                    path.display(),
                    from,
                    CURRENT_CHAT_STATE_VERSION
                )
                .green()
            );
        }
        LoadOutcome::Reset { reason } => {
            println!(
                "{}",
                format!("Reset {} ({})", path.display(), reason).yellow()
            );
        }
    }
    Ok(())
}
