//! SalesDesk API server.
//!
//! ```text
//! salesdesk-api [--config <path>]                 serve
//! salesdesk-api [--config <path>] issue-token <email>
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use salesdesk_api::{build_router, ApiConfig, AppState};
use salesdesk_db::Database;

enum Command {
    Serve,
    IssueToken(String),
}

fn parse_args() -> anyhow::Result<(Option<PathBuf>, Command)> {
    let mut config_path = None;
    let mut command = Command::Serve;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "issue-token" => {
                let email = args.next().context("issue-token needs an email")?;
                command = Command::IssueToken(email);
            }
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok((config_path, command))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,salesdesk=debug")),
        )
        .with_target(true)
        .init();

    let (config_path, command) = parse_args()?;

    let config = ApiConfig::load(config_path).context("Failed to load configuration")?;
    info!(
        addr = %config.socket_addr()?,
        database = ?config.database.path,
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("Using the development JWT secret, set SALESDESK_JWT_SECRET in production");
    }

    let db = Database::new(config.db_config())
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let addr = config.socket_addr()?;
    let state = AppState::new(db.clone(), config)?;

    if let Command::IssueToken(email) = command {
        let user = db
            .users()
            .find_by_email(&email)
            .await?
            .with_context(|| format!("No user with email {}", email))?;
        let token = state.jwt.generate_token(&user)?;
        println!("{}", token);
        return Ok(());
    }

    if !state.ad_insights.is_configured() {
        info!("Ad insights not configured, impressions will read as zero");
    }

    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "SalesDesk API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
