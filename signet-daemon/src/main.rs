//! Signet Daemon - challenge-response login and signed message relay.
//!
//! Serves the HTTP API over a local SQLite database.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use signet_daemon::directory::UserDirectory;
use signet_daemon::{router, AppState, Database, ServerConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// Signet Daemon - signature-authenticated messaging backend
#[derive(Parser)]
#[command(name = "signet-daemon", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default if no command given)
    Serve {
        /// Address to listen on (overrides SIGNET_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// User management
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List registered users
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::Users {
            action: UsersAction::List,
        }) => cmd_users_list(&config).await,
        Some(Commands::Serve { bind }) => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            cmd_serve(config).await
        }
        None => cmd_serve(config).await,
    }
}

async fn cmd_users_list(config: &ServerConfig) -> anyhow::Result<()> {
    let db = Database::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let users = UserDirectory::new(&db).await?.list().await?;

    if users.is_empty() {
        println!("No registered users.");
        return Ok(());
    }

    println!("{:<6} {:<24} {:<52} REGISTERED", "ID", "USERNAME", "KEY FINGERPRINT");
    for user in users {
        let registered = chrono::DateTime::from_timestamp(user.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{:<6} {:<24} {:<52} {}",
            user.id,
            user.username,
            user.public_key.fingerprint(),
            registered
        );
    }

    db.close().await;
    Ok(())
}

async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    let state = Arc::new(AppState::new(&db, &config).await?);
    let reaper = tokio::spawn(reap_expired(Arc::clone(&state), config.challenge_ttl));

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, "Signet daemon listening");

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    reaper.abort();
    db.close().await;

    match result {
        Ok(()) => {
            tracing::info!("Daemon shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Daemon shutdown with error");
            Err(e.into())
        }
    }
}

/// Drop abandoned login challenges and idle rate-limit buckets once per TTL.
async fn reap_expired(state: Arc<AppState>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let removed = state.nonces.cleanup_expired();
        if removed > 0 {
            tracing::debug!(removed, "Reaped expired challenges");
        }
        state.rate_limiter.prune();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
