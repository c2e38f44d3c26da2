//! Jetton Launchpad - token launch wizard backend for TON wallets
//!
//! Walks a user through a four-step token wizard, encodes the jetton mint
//! and DEX swap payloads as TON cells, and relays them to a connected wallet
//! for signing.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

mod api;
mod catalog;
mod cell;
mod config;
mod coordination;
mod error;
mod events;
mod metrics;
mod state;
mod tx;
mod wizard;

use catalog::{StaticCatalog, TokenCatalog};
use config::Settings;
use coordination::{BridgeSigner, CoordinatorConfig, SubmissionCoordinator};
use events::EventBus;
use metrics::MetricsServer;
use state::{InMemoryTokenRepository, TokenRepository};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Jetton Launchpad v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;

    let catalog = StaticCatalog::from_config(&settings.catalog.tokens)?;
    info!("Loaded catalog with {} tokens", catalog.len());
    let catalog: Arc<dyn TokenCatalog> = Arc::new(catalog);

    let tokens = Arc::new(InMemoryTokenRepository::new());
    let repository: Arc<dyn TokenRepository> = tokens.clone();
    let bridge = Arc::new(BridgeSigner::new());
    let events = EventBus::new(settings.launcher.event_capacity);

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    let coordinator = SubmissionCoordinator::new(
        bridge.clone(),
        repository.clone(),
        catalog.clone(),
        events,
        CoordinatorConfig::from(&settings.launcher),
    );
    info!(
        "Submission coordinator initialized (wallet timeout {:?})",
        settings.launcher.signer_timeout()
    );

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = api::AppState {
            coordinator: coordinator.clone(),
            repository: repository.clone(),
            catalog: catalog.clone(),
            bridge: bridge.clone(),
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Lifecycle event log
    let event_handle = tokio::spawn({
        let mut rx = coordinator.events().subscribe();
        async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.is_terminal() => {
                        info!(event = event.name(), submission = ?event.submission_id(), "Submission finished")
                    }
                    Ok(event) => debug!(event = event.name(), "Lifecycle event"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event log lagged, {} events skipped", n)
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    info!("Jetton Launchpad is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    if coordinator.cancel().await {
        info!("Cancelled the in-flight submission");
    }

    // Abort background tasks
    api_handle.abort();
    event_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Jetton Launchpad stopped ({} tokens created)", tokens.len());
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,jetton_launchpad=debug,hyper=warn"));

    let json = std::env::var("LAUNCHPAD_LOG_FORMAT").is_ok_and(|v| v == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
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
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
