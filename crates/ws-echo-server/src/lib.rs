//! # ws-echo-server
//!
//! Host build of the WebSocket echo endpoint.
//!
//! The ESP-IDF HTTP server runs each WebSocket handler on a blocking worker
//! task. This crate reproduces that model on Linux: tokio accepts
//! connections, and every connection is served on the blocking thread pool
//! through the same [`EchoHandler`](ws_echo_core::EchoHandler) the firmware
//! uses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ws_echo_core::{EchoHandler, Led};
//! use ws_echo_server::{EchoServer, ServerConfig, SimulatedLed};
//!
//! let config = ServerConfig::from_env()?;
//! let led = Led::init(SimulatedLed::new(config.led_gpio))?;
//! let handler = Arc::new(EchoHandler::new(led, config.echo));
//! let server = EchoServer::bind(config, handler).await?;
//! server.run().await?;
//! ```

pub mod config;
pub mod connection;
pub mod led;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use connection::{TransportError, WsConnection};
pub use led::SimulatedLed;
pub use server::{EchoServer, ServerError};
