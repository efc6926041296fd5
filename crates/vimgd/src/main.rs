//! vimgd - Vehicle Images Daemon
//!
//! Serves on-demand vehicle pictures as PNG over HTTP. Pictures are only
//! fetched from the remote account when a refresh is triggered (refresh
//! button, `update_images` service, or account setup).
//!
//! If no config file is provided, a demo account with generated pictures is
//! loaded.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vimg_api::{create_router, AppState};
use vimg_refresh::{create_connector, AccountRegistry, RegistryError};

mod config;
mod demo;

use config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "vimgd")]
#[command(about = "On-demand vehicle images over HTTP")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "VIMGD_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vimgd=info,vimg_refresh=debug,vimg_api=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    tracing::info!("Starting vimgd (Vehicle Images Daemon)");

    let config = match &args.config {
        Some(path) => {
            tracing::info!("Loading config from: {}", path.display());
            DaemonConfig::load(path)?
        }
        None => {
            tracing::info!("No config file provided, using demo account");
            DaemonConfig::default()
        }
    };

    let registry = Arc::new(AccountRegistry::new(config.refresh.clone()));

    if args.config.is_none() {
        registry
            .register(demo::credentials(), Arc::new(demo::connector()?))
            .await?;
    }

    for account in config.accounts {
        let connector = create_connector(&account.session);
        let username = account.credentials.username.clone();
        match registry.register(account.credentials, connector).await {
            Ok(entry) => {
                tracing::info!(entry_id = %entry.entry_id(), state = ?entry.state(), "Account registered")
            }
            Err(e @ RegistryError::AlreadyConfigured(_)) => {
                tracing::warn!(username = %username, error = %e, "Skipping duplicate account")
            }
            Err(e) => return Err(e.into()),
        }
    }

    let app = create_router(AppState::new(registry.clone()));

    let mut addr = config.server.addr();
    if let Some(port) = args.port {
        addr.set_port(port);
    }
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, logging out of all accounts");
    registry.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
