//! ESP32-specific components for the WebSocket echo example.
//!
//! This crate provides the ESP-IDF side of the boot sequence:
//! - WiFi station bring-up
//! - NVS flash initialization
//! - LED output on a GPIO pin
//! - The `/ws` handler registered on the ESP-IDF HTTP server
//!
//! # Architecture
//!
//! The echo logic itself lives in `ws-echo-core` and is shared with the
//! Linux build. This crate only adapts ESP-IDF drivers to the core traits;
//! [`board::Esp32Board`] ties them together for [`ws_echo_core::boot`].
//!
//! # Example
//!
//! ```ignore
//! use ws_echo_esp32::{board::Esp32Board, config::FirmwareConfig};
//!
//! let config = FirmwareConfig::new(env!("WS_ECHO_WIFI_SSID"), env!("WS_ECHO_WIFI_PASS"), "2")?;
//! let mut board = Esp32Board::new(peripherals.modem, sysloop, &config);
//! let booted = ws_echo_core::boot(&mut board, config.echo)?;
//! ```

pub mod board;
pub mod config;
pub mod http;
pub mod led;
pub mod nvs;
pub mod wifi;
