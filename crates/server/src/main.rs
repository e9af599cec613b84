//! Draftboard - live fantasy football draft board server

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use draftboard_core::Database;
use draftboard_net::{Server, ServerContext};

mod config;

use config::{ConfigError, ServerConfig};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] draftboard_core::Error),
    #[error(transparent)]
    Net(#[from] draftboard_net::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Draftboard");

    if let Err(e) = run().await {
        error!(error = %e, "Draftboard failed");
        std::process::exit(1);
    }
}

fn open_database(config: &ServerConfig) -> Result<Database, StartupError> {
    let db_path = config.database_path()?;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut db = Database::open(&db_path)?;
    info!(path = %db_path.display(), schema_version = db.schema_version(), "Database ready");

    let layout = config.layout();
    if db.initialize_draft(layout)? {
        info!(
            owners = layout.owners,
            rounds = layout.rounds,
            slots = layout.slot_count(),
            "New draft created"
        );
    }
    info!(players = db.players().count()?, "Player pool loaded");

    let expired = db.users().cleanup_expired_sessions()?;
    if expired > 0 {
        info!(expired, "Removed expired sessions");
    }

    Ok(db)
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::load()?;
    let db = open_database(&config)?;

    let stored = db.layout()?;
    if stored != config.layout() {
        warn!(
            stored_owners = stored.owners,
            stored_rounds = stored.rounds,
            "Configured layout differs from the existing draft; keeping the stored board"
        );
    }

    let ctx = ServerContext::new(
        Arc::new(Mutex::new(db)),
        config.clock_duration_ms(),
        config.session_hours,
    );
    let server = Server::start(config.port, ctx).await?;
    info!(addr = %server.addr(), "Accepting draft sessions");

    tokio::signal::ctrl_c().await?;
    info!(sessions = server.sessions(), "Interrupt received");
    server.shutdown();

    // Let sessions flush the shutdown notice
    tokio::time::sleep(Duration::from_millis(250)).await;
    Ok(())
}
