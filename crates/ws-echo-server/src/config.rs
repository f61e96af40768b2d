//! Host server configuration.
//!
//! Defaults match the firmware: one endpoint on `/ws`, LED on GPIO 2.
//! A few environment variables override them for local runs.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use ws_echo_core::{EchoConfig, ECHO_PATH};

/// Environment variable overriding the bind address.
pub const BIND_ENV: &str = "WS_ECHO_BIND";
/// Environment variable bounding the payload size in bytes.
pub const MAX_PAYLOAD_ENV: &str = "WS_ECHO_MAX_PAYLOAD";

/// Errors that can occur while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the echo server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Path the echo endpoint is served on.
    pub path: String,
    /// GPIO number reported by the simulated LED.
    pub led_gpio: u32,
    /// Echo handler tuning.
    pub echo: EchoConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: ECHO_PATH.to_string(),
            led_gpio: 2,
            echo: EchoConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults with `WS_ECHO_BIND` and `WS_ECHO_MAX_PAYLOAD` applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(BIND_ENV) {
            config.bind_addr = value.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    name: BIND_ENV,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(value) = lookup(MAX_PAYLOAD_ENV) {
            let max = value.parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: MAX_PAYLOAD_ENV,
                value: value.clone(),
                reason: e.to_string(),
            })?;
            config.echo.max_payload_len = Some(max);
        }

        Ok(config)
    }
}
