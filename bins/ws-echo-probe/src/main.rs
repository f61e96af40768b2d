//! Echo endpoint probe.
//!
//! Connects to the echo endpoint, sends a numbered greeting once per second
//! and prints each reply. Every reply should toggle the device LED.
//!
//! ```text
//! ws-echo-probe [URL] [COUNT]
//! ```
//!
//! `URL` defaults to `ws://127.0.0.1:8080/ws`. Without `COUNT` the probe runs
//! until Ctrl+C.

use std::time::Duration;

use anyhow::{bail, Context};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
    let count = args
        .next()
        .map(|n| n.parse::<u64>())
        .transpose()
        .context("COUNT must be a positive integer")?;

    tokio::select! {
        result = probe(&url, count) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopped by user");
            Ok(())
        }
    }
}

async fn probe(url: &str, count: Option<u64>) -> anyhow::Result<()> {
    tracing::info!("Connecting to {}...", url);
    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {}", url))?;
    tracing::info!("Connected!");

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut sent = 0u64;

    while count.map_or(true, |limit| sent < limit) {
        interval.tick().await;
        sent += 1;

        let message = greeting(sent);
        tracing::info!("Sending: {}", message);
        ws.send(Message::Text(message)).await?;

        let reply = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break text,
                Some(Ok(Message::Close(frame))) => bail!("server closed connection: {:?}", frame),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => bail!("connection closed"),
            }
        };
        tracing::info!("Received: {}", reply);
    }

    ws.close(None).await.ok();
    Ok(())
}

fn greeting(n: u64) -> String {
    format!("Hello ESP32! Message #{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_numbered() {
        assert_eq!(greeting(1), "Hello ESP32! Message #1");
        assert_eq!(greeting(42), "Hello ESP32! Message #42");
    }
}
