//! compass - run coaching turns and inspect per-user state
//!
//! Usage:
//!   compass turn --user U --message M        → one turn via the Anthropic adapter
//!   compass turn --user U --message M --reply-file F
//!                                            → one turn with a scripted reply
//!   compass stance|facts|presence --user U   → inspect stored state
//!   compass presence-update --user U --id ID --status S [--snooze-minutes N]
//!   compass block-topic --user U --topic T --minutes N
//!   compass config                           → print effective config

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use compass_core::{CompassConfig, PresenceStatus, TurnRequest, UserId};
use compass_engine::{latest_visible_within, TurnOrchestrator};
use compass_llm::{AnthropicProvider, LlmProvider, ProviderCompletion, ScriptedProvider};
use compass_store::{FactStore, JsonFileStore, PresenceStore, StanceStore, Store};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "compass",
    about = "Adaptive coaching turns with stance learning, guardrails and fact memory",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "compass.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one turn and print the reply with its evaluation
    Turn {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        message: String,
        /// Use this file's contents as the completion instead of calling the API
        #[arg(long)]
        reply_file: Option<PathBuf>,
    },
    /// Show a user's stance profile
    Stance {
        #[arg(short, long)]
        user: String,
    },
    /// Show a user's stored facts
    Facts {
        #[arg(short, long)]
        user: String,
    },
    /// Show the latest visible presence event
    Presence {
        #[arg(short, long)]
        user: String,
    },
    /// Mark a presence event shown, snoozed or dismissed
    PresenceUpdate {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        status: PresenceStatus,
        /// Snooze length; only used with --status snoozed
        #[arg(long)]
        snooze_minutes: Option<i64>,
    },
    /// Block a presence topic for a while
    BlockTopic {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        minutes: i64,
    },
    /// Print the effective config
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = CompassConfig::load(&cli.config);

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml());
        }
        Commands::Turn {
            user,
            message,
            reply_file,
        } => {
            let store = open_store(&config).await?;
            let provider = provider_for(reply_file).await?;
            let completion = Arc::new(ProviderCompletion::from_config(provider, &config.completion));
            let orchestrator = TurnOrchestrator::new(store, completion, &config);

            let response = orchestrator.run_turn(TurnRequest::new(user, message)).await?;
            print_json(&response)?;
        }
        Commands::Stance { user } => {
            let store = open_store(&config).await?;
            let stance = store.load_stance(&UserId::new(user)).await?.unwrap_or_default();
            print_json(&stance)?;
        }
        Commands::Facts { user } => {
            let store = open_store(&config).await?;
            let facts = store.load_facts(&UserId::new(user)).await?;
            print_json(&facts)?;
        }
        Commands::Presence { user } => {
            let store = open_store(&config).await?;
            let user = UserId::new(user);
            let events = store.recent_events(&user, config.presence.scan_window).await?;
            let metas = store.all_topic_meta(&user).await?;
            let visible = latest_visible_within(&events, &metas, Utc::now(), config.presence.scan_window);
            print_json(&visible)?;
        }
        Commands::PresenceUpdate {
            user,
            id,
            status,
            snooze_minutes,
        } => {
            let snoozed_until = match (status, snooze_minutes) {
                (PresenceStatus::Snoozed, Some(minutes)) => Some(Utc::now() + Duration::minutes(minutes)),
                (PresenceStatus::Snoozed, None) => anyhow::bail!("--status snoozed needs --snooze-minutes"),
                _ => None,
            };
            let store = open_store(&config).await?;
            let event = store
                .update_event(&UserId::new(user), &id, status, snoozed_until)
                .await?;
            print_json(&event)?;
        }
        Commands::BlockTopic {
            user,
            topic,
            minutes,
        } => {
            let store = open_store(&config).await?;
            let user = UserId::new(user);
            let topic = topic.trim().to_lowercase();
            let mut meta = store.topic_meta(&user, &topic).await?;
            meta.blocked_until = Some(Utc::now() + Duration::minutes(minutes));
            store.set_topic_meta(&user, &topic, meta.clone()).await?;
            print_json(&meta)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compass=info,compass_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_store(config: &CompassConfig) -> anyhow::Result<Arc<dyn Store>> {
    let store = JsonFileStore::open(&config.store.path)
        .await
        .with_context(|| format!("opening store at {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

async fn provider_for(reply_file: Option<PathBuf>) -> anyhow::Result<Arc<dyn LlmProvider>> {
    if let Some(path) = reply_file {
        let reply = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading reply file {}", path.display()))?;
        tracing::info!("using scripted reply from {}", path.display());
        return Ok(Arc::new(ScriptedProvider::text(reply)));
    }

    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set (or pass --reply-file)"))?;
    Ok(Arc::new(AnthropicProvider::new(api_key)))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
