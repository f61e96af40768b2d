//! WebSocket echo server for Linux.
//!
//! Runs the same echo handler as the ESP32 firmware. The LED is simulated
//! and its level changes show up in the log.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ws_echo_core::{EchoHandler, Led};
use ws_echo_server::{EchoServer, ServerConfig, SimulatedLed};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    // Connection threads sit in blocking reads; do not wait for clients to hang up.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ws_echo=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("WebSocket echo server starting...");

    let config = ServerConfig::from_env()?;

    tracing::info!("Configuring LED on GPIO {}", config.led_gpio);
    let led = Led::init(SimulatedLed::new(config.led_gpio))?;
    let handler = Arc::new(EchoHandler::new(led, config.echo));

    let server = EchoServer::bind(config, handler).await?;
    let addr = server.local_addr()?;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("Echo server error: {}", e);
        }
    });

    tracing::info!("Try: websocat ws://{}/ws", addr);

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = server_handle => {
            tracing::warn!("Echo server stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
