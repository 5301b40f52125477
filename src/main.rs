//! podbay -- Kubernetes workload demo server.
//!
//! Startup order matters: mount capabilities are synchronous local
//! stats taken before the listener binds, while cloud capability
//! probing runs as a background task so an unreachable cloud API can
//! never delay serving traffic.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

/// Command-line arguments for the podbay server.
#[derive(Parser, Debug)]
#[command(
    name = "podbay",
    version,
    about = "Kubernetes workload demo service: pod capabilities and cloud object storage"
)]
struct Cli {
    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Version: {}", podbay::APP_VERSION);
    let config = podbay::config::Config::from_env();

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register metric descriptions.
    podbay::metrics::init_metrics();
    podbay::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // Synchronous mount stats: the only probing allowed before binding.
    let mounts = podbay::capability::MountCapabilities::detect(&config.mounts);
    info!(
        "mounts detected: filesystem={} secret={} config_map={}",
        mounts.filesystem, mounts.secret, mounts.config_map
    );

    let gateway = Arc::new(podbay::storage::gateway::StorageGateway::new(
        config.storage.operation_timeout,
    ));

    // Cloud capability probing runs in the background; early requests
    // against storage routes see WrongPlatform until it publishes.
    podbay::capability::CapabilityProbe::spawn(&config, gateway.clone());

    let state = Arc::new(podbay::AppState {
        config: config.clone(),
        healthy: AtomicBool::new(true),
        mounts,
        gateway,
        http: reqwest::Client::new(),
    });

    let app = podbay::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        "{}: server starting on {}",
        config.identity.pod, bind_addr
    );

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and let in-flight requests complete before exiting.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("podbay shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
