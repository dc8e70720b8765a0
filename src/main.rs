//! RCON gateway - Discord bot relaying chat commands to game server consoles
//!
//! Channels are authorized with RCON credentials collected over direct
//! messages; afterwards every message in the channel is sent to the server
//! and the response posted back.

mod common;
mod config;
mod discord;
mod gateway;
mod protocol;
mod storage;
mod system;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{env::get_config_path, load_and_validate};
use discord::DiscordBot;
use gateway::{CommandTable, Dispatcher, GatewayState};
use protocol::rcon::TcpRconConnector;
use storage::JsonStore;
use system::ServiceManager;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = get_config_path();
    let loaded = load_and_validate(&config_path);

    let level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    info!("RCON gateway v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from {}...", config_path);

    let config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Default prefix: {}", config.discord.default_prefix);
    info!("  Data directory: {}", config.storage.data_dir);
    info!("  Service manager: {}", config.system.service_manager);

    let store = Arc::new(JsonStore::new(&config.storage.data_dir));
    let state = Arc::new(GatewayState::load(store, &config.discord).await?);
    let connector = Arc::new(TcpRconConnector::new(Duration::from_secs(
        config.rcon.timeout_secs,
    )));
    let processes = Arc::new(ServiceManager::new(config.system.service_manager.clone()));

    let bot = DiscordBot::build(config.discord.clone()).await?;
    let dispatcher = Arc::new(Dispatcher::new(
        state,
        Arc::new(bot.sink()),
        connector,
        processes,
        CommandTable::with_defaults(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!("Starting Discord bot...");
    let mut discord_task = tokio::spawn(bot.run(dispatcher.clone(), shutdown_rx));

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - shutting down...");
            true
        }
        _ = &mut discord_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (Discord task already exited): {}", e);
        }
        match tokio::time::timeout(Duration::from_secs(5), discord_task).await {
            Ok(Ok(())) => info!("Discord disconnected gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Saving state...");
    if let Err(e) = dispatcher.flush().await {
        error!("Failed to save state: {}", e);
        return Err(e.into());
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
