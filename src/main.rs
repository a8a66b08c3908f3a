use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stronghold_lobby_server::accounts::MemoryAccounts;
use stronghold_lobby_server::config::LobbyConfig;
use stronghold_lobby_server::crypto::KeystreamCrypto;
use stronghold_lobby_server::handler::LobbyState;
use stronghold_lobby_server::net::{ChannelSink, ConnectionSink, LobbyServer};
use stronghold_lobby_server::registry::IdAllocator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    info!("Stronghold Lobby Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = LobbyConfig::load_or_default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    info!(
        "Configuration loaded: {}:{}, lobby_ip={}",
        config.bind_address, config.port, config.lobby_ip
    );

    // Initialize shared state
    let ids = Arc::new(IdAllocator::new());
    let sink = Arc::new(ChannelSink::new());
    let state = Arc::new(LobbyState::new(
        config,
        Arc::new(MemoryAccounts::new(Arc::clone(&ids))),
        Arc::new(KeystreamCrypto),
        Arc::clone(&sink) as Arc<dyn ConnectionSink>,
        ids,
    ));

    // Periodic stats line
    let stats_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            info!(
                online = stats_state.online.count(),
                servers = stats_state.servers.servers().len(),
                "lobby stats"
            );
        }
    });

    let server = Arc::new(LobbyServer::new(Arc::clone(&state), sink));

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
        info!("Shutdown signal received");
    };

    // Run server with graceful shutdown
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Server stopped");
    Ok(())
}
