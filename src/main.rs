//! PC Remote - authenticated local command server
//!
//! Runs whitelisted shell commands on request and moves the PC between the
//! desk monitors and the living-room TV (input switch + monitor profile).

mod api;
mod commands;
mod config;
mod device;
mod dispatch;
mod error;
mod models;
mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{CommandTable, SystemShell};
use crate::config::{ConfigSnapshot, ConfigSource, FileConfigSource};
use crate::device::{
    DeviceSynchronizer, MonitorSwitcher, PairingStore, SyncSettings, WebOsClient, WebOsOptions,
};
use crate::dispatch::Dispatcher;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pc_remote=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting PC Remote...");

    // Load configuration
    let source = Arc::new(FileConfigSource::from_env_or_default());
    let snapshot = source.load()?;
    tracing::info!(
        "[Config] Loaded from {}: {} commands",
        source.describe(),
        snapshot.commands.len()
    );

    let device = Arc::new(build_synchronizer(&snapshot));

    // Handshake runs in the background; device commands queue behind it
    let startup = device.spawn_startup();
    tokio::spawn(async move {
        match startup.await {
            Ok(Ok(())) => tracing::info!("[Device] TV session established"),
            Ok(Err(e)) => tracing::error!(
                "[Device] TV unavailable, device commands disabled until restart: {}",
                e
            ),
            Err(e) => tracing::error!("[Device] Startup task failed: {}", e),
        }
    });

    let addr = format!("{}:{}", snapshot.server.host, snapshot.server.port);
    let table = Arc::new(CommandTable::new(snapshot, source));
    let dispatcher = Arc::new(Dispatcher::new(table, device.clone(), Arc::new(SystemShell)));

    let app = api::routes()
        .with_state(AppState { dispatcher, device })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_synchronizer(snapshot: &ConfigSnapshot) -> DeviceSynchronizer {
    let server = &snapshot.server;
    let device = &snapshot.device;

    let client = WebOsClient::new(WebOsOptions {
        address: server.tv_ip.clone(),
        secure: device.secure,
        request_timeout: device.request_timeout(),
        pairing_timeout: device.pairing_timeout(),
    });

    let store = PairingStore::new(device.pairing_file());
    tracing::info!("[Pairing] Record location: {}", store.path().display());

    let profiles = MonitorSwitcher::new(
        device.profile_switcher(),
        device.profiles_dir(),
        device.profile_timeout(),
    );

    DeviceSynchronizer::new(
        Box::new(client),
        store,
        Arc::new(profiles),
        SyncSettings {
            input_label: server.pc_tv_input_label.clone(),
            device_profile: server.pc_tv_profile.clone(),
            desk_profile: server.pc_desk_profile.clone(),
            settle_delay: device.settle_delay(),
        },
    )
}
