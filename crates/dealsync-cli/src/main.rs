use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dealsync")]
#[command(about = "dealsync CLI - inspect, migrate and replay client sync state", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a chat state file at the current schema version
    Migrate {
        /// Chat state file (defaults to the configured location)
        file: Option<PathBuf>,
    },
    /// Print the conversations and scope map of a chat state file
    Inspect {
        /// Chat state file (defaults to the configured location)
        file: Option<PathBuf>,
    },
    /// Feed recorded push events through a sync engine and print the result
    Replay {
        /// JSON Lines file, one `{"event": ..., "payload": ...}` per line
        events: PathBuf,
        /// Restore chat state from this file before replaying
        #[arg(long)]
        state: Option<PathBuf>,
        /// Transaction id to scope the session to before replaying
        #[arg(long)]
        transaction: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dealsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = dealsync_infrastructure::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Migrate { file } => commands::migrate::run(&config, file).await?,
        Commands::Inspect { file } => commands::inspect::run(&config, file).await?,
        Commands::Replay {
            events,
            state,
            transaction,
        } => commands::replay::run(&config, &events, state, transaction).await?,
    }

    Ok(())
}
