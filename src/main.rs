//! # Driftmail — durable user-lifecycle email notifier
//!
//! One run per user, created at signup: welcome email, 3-day sleep, then an
//! unbounded loop of activity checks and nudge emails with 30-day sleeps.
//! Runs and step checkpoints live in SQLite, so a restart resumes every run
//! where it left off.
//!
//! Usage:
//!   driftmail                          # Start gateway + notifier loop
//!   driftmail --port 9000              # Custom gateway port
//!   driftmail --dry-run                # Record emails instead of sending
//!   driftmail --tick-secs 5            # Faster wake checks (local dev)

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use driftmail_channels::{MemoryMailer, SmtpMailer};
use driftmail_core::DriftmailConfig;
use driftmail_core::traits::Mailer;
use driftmail_engine::{NotifierDb, NotifierEngine, SqliteActivityStore, spawn_notifier};
use driftmail_gateway::AppState;

#[derive(Parser)]
#[command(
    name = "driftmail",
    version,
    about = "📬 Driftmail — durable user-lifecycle email notifier"
)]
struct Cli {
    /// Config file path (default: ~/.driftmail/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Gateway port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Database path override
    #[arg(long)]
    db_path: Option<String>,

    /// Notifier wake interval override, in seconds
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Record emails in memory instead of sending over SMTP
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "driftmail=debug,tower_http=debug"
    } else {
        "driftmail=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load configuration and apply CLI overrides
    let mut config = match &cli.config {
        Some(path) => DriftmailConfig::load_from(Path::new(&expand_path(path)))?,
        None => DriftmailConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(db_path) = &cli.db_path {
        config.engine.db_path = db_path.clone();
    }
    if let Some(tick_secs) = cli.tick_secs {
        config.engine.tick_secs = tick_secs;
    }

    // Open the notifier database
    let db_path = expand_path(&config.engine.db_path);
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(NotifierDb::open(Path::new(&db_path))?);
    tracing::info!("💾 Notifier database: {db_path}");

    // Pick the mailer: SMTP when configured, in-memory otherwise
    let mailer: Arc<dyn Mailer> = if cli.dry_run {
        tracing::info!("📭 Dry run — emails will be recorded, not delivered");
        Arc::new(MemoryMailer::new())
    } else if config.smtp.enabled && !config.smtp.from_address.is_empty() {
        Arc::new(SmtpMailer::new(config.smtp.clone()))
    } else {
        tracing::warn!("⚠️ SMTP not configured — falling back to in-memory mailer");
        Arc::new(MemoryMailer::new())
    };

    let activity = Arc::new(SqliteActivityStore::new(db.clone()));
    let engine = Arc::new(NotifierEngine::new(db, activity, mailer));

    // Background loop that drives due runs
    tokio::spawn(spawn_notifier(engine.clone(), config.engine.tick_secs));

    // Gateway — the signup flow posts to /api/workflows/onboarding
    driftmail_gateway::serve(
        AppState::new(engine),
        &config.gateway.host,
        config.gateway.port,
    )
    .await?;

    Ok(())
}
