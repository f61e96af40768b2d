//! # ws-echo-core
//!
//! Core logic for the WebSocket echo example.
//!
//! This crate provides:
//! - The echo handler (probe, read, echo, toggle)
//! - LED state tracking over an abstract output pin
//! - Frame and transport abstractions mirroring the ESP-IDF WebSocket API
//! - Storage initialization with the erase-and-retry recovery path
//! - The boot sequence (storage, LED, network, server)
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.

pub mod boot;
pub mod frame;
pub mod handler;
pub mod led;
pub mod storage;

pub use boot::{boot, BootError, Booted, Platform};
pub use frame::{FrameHeader, FrameKind, FrameTransport, Phase};
pub use handler::{EchoConfig, EchoHandler, HandlerError, Outcome};
pub use led::{Led, LedPin, Level};
pub use storage::{init_storage, StorageBackend, StorageError, StorageStatus};

/// Log target shared by every component of the example.
pub const LOG_TARGET: &str = "ws_echo";

/// Path the echo endpoint is registered on.
pub const ECHO_PATH: &str = "/ws";
