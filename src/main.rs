//! registry-composer - Multi-protocol artifact repository server
//!
//! Loads the repository configurations, composes a handler for each of them
//! and serves them behind one HTTP front end.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use registry_composer::client::HttpClient;
use registry_composer::compose::Composer;
use registry_composer::config::Config;
use registry_composer::logging::init_tracing;
use registry_composer::registry::ProtocolRegistry;
use registry_composer::server::{AppState, RepositorySlices, Server};
use registry_composer::settings::{Settings, YamlSettings};

/// registry-composer - Multi-protocol artifact repository server
#[derive(Parser, Debug)]
#[command(name = "registry-composer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "REGISTRY_COMPOSER_CONFIG")]
    config: Option<String>,

    /// Serve only this repository, at the root path
    #[arg(long, env = "REGISTRY_COMPOSER_STANDALONE")]
    standalone: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        layout = ?config.meta.layout,
        "Starting registry-composer"
    );

    let settings: Arc<dyn Settings> = Arc::new(YamlSettings::new(config.meta.clone()));
    let aliases = settings.storage_aliases().await?;
    info!(aliases = aliases.len(), "Storage aliases loaded");

    let client = Arc::new(HttpClient::start(&config.http_client)?);
    let client_guard = client.shutdown_guard();
    let registry = Arc::new(ProtocolRegistry::with_defaults());
    info!(registry = ?registry, "Protocol registry initialized");

    let composer = Composer::new(Arc::clone(&settings), registry, Arc::clone(&client));

    let slices = match &args.standalone {
        Some(name) => {
            let slice = composer.build_named(name, &aliases, true).await?;
            info!(repo = %name, "Serving standalone repository");
            RepositorySlices::standalone(name.clone(), slice)
        }
        None => {
            let repos = composer.build_all(&aliases).await?;
            RepositorySlices::shared(settings.layout(), repos)
        }
    };

    let state = AppState::new(slices).with_body_limit(config.server.max_body_bytes);
    let server = Server::new(config.server.clone(), state);
    info!(addr = %server.bind_addr(), "Starting HTTP server");

    let result = server.run(shutdown_signal()).await;

    drop(client_guard);

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("registry-composer shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
