//! HTTP server lifecycle.

use anyhow::{Context, Result};
use keysense::KeyEngine;
use tracing::{info, warn};

use crate::web::{router, AppState};

/// Server configuration
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

impl ServeConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bind and serve until SIGINT or SIGTERM.
pub async fn run(config: ServeConfig, engine: KeyEngine) -> Result<()> {
    info!(
        executor = engine.executor_name(),
        key_limit = engine.params().key_candidate_limit,
        "Starting keysensed"
    );

    let app = router(AppState::new(engine));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("keysensed ready");
    info!("   Analyze PCP: POST http://{}/api/analyze/pcp", addr);
    info!("   Analyze progression: POST http://{}/api/analyze/progression", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
