//! WebSocket echo server for ESP32.
//!
//! Boots NVS, the LED and WiFi, then serves `/ws` on port 80. Every frame is
//! echoed back and each successful echo toggles the LED.
//!
//! Build with the ESP32 Rust toolchain:
//!
//! ```text
//! WIFI_SSID=MyNetwork WIFI_PASS=secret LED_GPIO=2 cargo build --release
//! ```

use std::thread;
use std::time::Duration;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::reset;
use esp_idf_svc::log::EspLogger;
use log::{error, info};
use ws_echo_core::{ECHO_PATH, LOG_TARGET};
use ws_echo_esp32::board::Esp32Board;
use ws_echo_esp32::config::FirmwareConfig;

fn main() {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    if let Err(e) = run() {
        error!(target: LOG_TARGET, "Boot failed: {:#}", e);
        // Give the log a moment to drain before rebooting.
        thread::sleep(Duration::from_secs(5));
        reset::restart();
    }
}

fn run() -> anyhow::Result<()> {
    let config = FirmwareConfig::new(
        env!("WS_ECHO_WIFI_SSID"),
        env!("WS_ECHO_WIFI_PASS"),
        env!("WS_ECHO_LED_GPIO"),
    )?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let mut board = Esp32Board::new(peripherals.modem, sysloop, &config);
    let booted = ws_echo_core::boot(&mut board, config.echo)?;

    if booted.server.is_some() {
        if let Some(ip) = board.ip() {
            info!(target: LOG_TARGET, "Echo server running at ws://{}{}", ip, ECHO_PATH);
        }
    }

    // The HTTP server and WiFi driver run on their own tasks; keep them alive
    // after main returns.
    core::mem::forget(board.take_wifi());
    core::mem::forget(booted);
    Ok(())
}
