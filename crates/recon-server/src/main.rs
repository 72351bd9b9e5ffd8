//! Recon Server Entry Point

use recon_server::{AppConfig, create_api_router, logging};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!("🚀 Starting Recon Server");

    if !config.runner.script_path.exists() {
        warn!(
            script = %config.runner.script_path.display(),
            "Recon script not found, /run will fail until it exists"
        );
    }

    let app = create_api_router(&config);
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("📡 Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ HTTP server error: {}", e);
            e
        })?;

    info!("✅ Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Received Ctrl-C, initiating graceful shutdown..."),
        Err(err) => {
            error!("Failed to listen for Ctrl-C signal: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
