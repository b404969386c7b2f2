//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use pipewright::config::Config;
use pipewright::server::{self, AppState};
use pipewright::store::FileArtifactStore;

pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = Config::load(config_path).await?;

    // CLI overrides config
    if let Some(host) = host_override {
        config.server.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    if config.server.secret.is_none() {
        warn!("No server.secret configured; every run request will be rejected");
    }
    match config.sandbox.max_concurrent_executions {
        Some(limit) => info!(limit, "Script admission limit enabled"),
        None => warn!(
            "sandbox.max_concurrent_executions is unset; concurrent runs may spawn unbounded script processes"
        ),
    }

    let (orchestrator, store) = super::build_orchestrator(&config, Path::new(config_path))?;

    // Spawn run-folder retention sweep
    if config.artifacts.retention_hours > 0 {
        spawn_retention_sweep(store, config.artifacts.retention_hours);
        info!(
            retention_hours = config.artifacts.retention_hours,
            "Run folder retention enabled"
        );
    }

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        secret: config.server.secret.clone(),
        max_connections: config.server.max_connections,
    };
    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn spawn_retention_sweep(store: Arc<FileArtifactStore>, retention_hours: u64) {
    let ttl = Duration::from_secs(retention_hours.saturating_mul(3600));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = store.sweep_expired(ttl).await {
                warn!(error = %e, "Run folder sweep failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
