//! Scopecast agent: connects to the real-time endpoint, hosts the event hub
//! and logs everything it receives.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use scopecast_core::config::AppConfig;
use scopecast_core::error::AppError;
use scopecast_realtime::connection::ConnectionStatus;
use scopecast_realtime::metrics::RealtimeMetrics;
use scopecast_realtime::services::CollaborationService;
use scopecast_realtime::{ConnectionManager, MessageType, RealtimeHub};

#[tokio::main]
async fn main() {
    let env = std::env::var("SCOPECAST_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Agent error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Scopecast agent v{}", env!("CARGO_PKG_VERSION"));

    let metrics = Arc::new(RealtimeMetrics::new());

    // ── Step 1: Event hub on the configured broker ───────────────
    tracing::info!(backend = ?config.broker.backend, "Initializing event hub...");
    let hub = RealtimeHub::from_config(&config.broker, metrics.clone()).await?;
    let _scopes = hub.watch_scopes(&config.agent.scopes, |scope, event| {
        tracing::info!(
            scope = %scope,
            kind = %event.kind,
            payload = %event.payload,
            "Event received"
        );
    })?;
    let _rooms: Vec<_> = config
        .agent
        .rooms
        .iter()
        .map(|room| {
            let name = room.clone();
            hub.on_presence_change(room, move |participants| {
                tracing::info!(room = %name, ?participants, "Presence changed");
            })
        })
        .collect();
    tracing::info!(
        scopes = config.agent.scopes.len(),
        rooms = config.agent.rooms.len(),
        "Hub subscriptions registered"
    );

    // ── Step 2: Connection manager + handlers ────────────────────
    let connection = ConnectionManager::websocket(&config.realtime, metrics.clone());
    let _status = connection.on_connection_change(|status| match status {
        ConnectionStatus::Connected => tracing::info!("Connected"),
        ConnectionStatus::Disconnected => tracing::info!("Disconnected"),
        ConnectionStatus::Error(reason) => tracing::warn!(error = %reason, "Connection error"),
        ConnectionStatus::Reconnecting { attempt, delay } => {
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting")
        }
        ConnectionStatus::GaveUp { attempts } => {
            tracing::error!(attempts, "Gave up reconnecting; press Ctrl+C to exit")
        }
    });
    for message_type in MessageType::ALL {
        connection.subscribe_to_type(message_type, move |message| {
            tracing::info!(
                message_type = %message_type,
                id = %message.id,
                room = message.room.as_deref().unwrap_or("-"),
                sender = message.sender.as_deref().unwrap_or("-"),
                data = %message.data,
                "Message received"
            );
        });
    }
    // Remote presence messages feed the hub's room presence.
    let collaboration =
        CollaborationService::with_presence(Arc::new(connection.clone()), hub.presence.clone());

    // ── Step 3: Connect ──────────────────────────────────────────
    tracing::info!(url = %config.realtime.url, "Connecting...");
    connection.connect().await?;

    // ── Step 4: Run until shutdown ───────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, disconnecting...");

    collaboration.detach();
    connection.disconnect();
    hub.shutdown().await;

    let snapshot = metrics.snapshot();
    tracing::info!(
        sent = snapshot.messages_sent,
        received = snapshot.messages_received,
        malformed = snapshot.malformed_dropped,
        reconnects = snapshot.reconnect_attempts,
        published = snapshot.events_published,
        delivered = snapshot.events_delivered,
        "Agent stopped"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
