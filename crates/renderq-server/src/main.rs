//! renderq server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use renderq_server::engine::RemotionEngine;
use renderq_server::{http, AppState, Config, Sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let engine = Arc::new(RemotionEngine::new(&config));
    let state = AppState::new(config, engine);

    // Retention sweeper owned by the process lifecycle: started here,
    // cancelled on shutdown.
    let sweep_cancel = CancellationToken::new();
    let sweeper = tokio::spawn(Sweeper::new(state.clone()).run(sweep_cancel.clone()));

    let router = http::create_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        output_dir = %state.config.output_dir.display(),
        retention_hours = state.config.retention_hours,
        "renderq listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_cancel.cancel();
    let _ = sweeper.await;
    info!("renderq stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
    }
}
