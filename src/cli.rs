use crate::backend::HttpFlowBackend;
use crate::bookings::sample::SampleLedger;
use crate::channels::{TelegramAdapter, WhatsAppAdapter};
use crate::config::{Config, load_config};
use crate::gateway::{self, AppState};
use crate::model::{ConversationRegistry, InMemoryContactDirectory};
use crate::orchestrator::Orchestrator;
use crate::reservations::{InMemorySlotStore, ReservationEngine};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "concierge", version, about = "Hotel assistant messaging backend")]
struct Cli {
    /// Path to the configuration file (defaults to ./config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook gateway (the default).
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CheckConfig => {
            println!("configuration OK");
            Ok(())
        }
    }
}

/// Build the object graph once at entry and hand it to the gateway; no
/// ambient global state.
async fn serve(config: Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(config.backend.timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let directory = Arc::new(InMemoryContactDirectory::new());
    let registry = Arc::new(ConversationRegistry::new());
    let reservations = Arc::new(ReservationEngine::new(Arc::new(InMemorySlotStore::new())));
    let backend = Arc::new(HttpFlowBackend::new(
        config.backend.base_url.clone(),
        client.clone(),
    ));
    let ledger = Arc::new(SampleLedger::new());
    let orchestrator = Arc::new(Orchestrator::new(
        backend,
        reservations.clone(),
        ledger,
        registry.clone(),
    ));

    let state = AppState {
        orchestrator,
        whatsapp: Arc::new(WhatsAppAdapter::new(
            config.whatsapp.clone(),
            client.clone(),
            directory.clone(),
            registry.clone(),
        )),
        telegram: Arc::new(TelegramAdapter::new(
            config.telegram.clone(),
            client,
            directory,
            registry,
        )),
        reservations,
    };

    info!(
        "starting concierge {} (whatsapp={}, telegram={})",
        crate::VERSION,
        config.whatsapp.enabled,
        config.telegram.enabled
    );
    gateway::serve(&config.gateway.host, config.gateway.port, state).await
}
