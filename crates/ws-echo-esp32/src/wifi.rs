//! WiFi connection utilities for ESP32.
//!
//! Brings the station interface up and blocks until DHCP has assigned an
//! address.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::peripheral,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use log::{info, warn};
use ws_echo_core::LOG_TARGET;

use crate::config::WifiConfig;

/// Connection attempts before giving up.
pub const MAX_CONNECT_ATTEMPTS: u32 = 5;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Connect to a WiFi network.
///
/// This function handles the full WiFi connection process:
/// 1. Scans for available networks
/// 2. Finds the target network and its channel
/// 3. Connects with the provided credentials, retrying up to
///    [`MAX_CONNECT_ATTEMPTS`] times
/// 4. Waits for DHCP lease
///
/// Returns a boxed `EspWifi` instance that must be kept alive for the
/// connection to remain active, and the assigned IP address.
///
/// # Example
///
/// ```ignore
/// let (wifi, ip) = connect_wifi(&config.wifi, peripherals.modem, sysloop, Some(nvs))?;
/// // Keep `wifi` alive to maintain the connection
/// ```
pub fn connect_wifi(
    config: &WifiConfig,
    modem: impl peripheral::Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
    sysloop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
) -> Result<(Box<EspWifi<'static>>, String)> {
    let ssid = config.ssid.as_str();
    let password = config.password.as_str();

    if ssid.is_empty() {
        bail!("WiFi SSID cannot be empty");
    }

    let auth_method = if password.is_empty() {
        info!(target: LOG_TARGET, "WiFi password is empty, using open network");
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sysloop)?;

    // Initial configuration for scanning
    wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
    wifi.start()?;

    info!(target: LOG_TARGET, "Scanning for WiFi networks...");
    let channel = wifi
        .scan()?
        .into_iter()
        .find(|ap| ap.ssid == ssid)
        .map(|ap| {
            info!(target: LOG_TARGET, "Found '{}' on channel {}", ssid, ap.channel);
            ap.channel
        });

    if channel.is_none() {
        info!(target: LOG_TARGET, "Network '{}' not found in scan, will try anyway", ssid);
    }

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid
            .try_into()
            .map_err(|_| anyhow!("SSID too long (max 32 chars)"))?,
        password: password
            .try_into()
            .map_err(|_| anyhow!("Password too long (max 64 chars)"))?,
        channel,
        auth_method,
        ..Default::default()
    }))?;

    let mut attempt = 1;
    loop {
        info!(
            target: LOG_TARGET,
            "Connecting to '{}' (attempt {}/{})...", ssid, attempt, MAX_CONNECT_ATTEMPTS
        );
        match wifi.connect() {
            Ok(()) => break,
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                warn!(target: LOG_TARGET, "Connection to '{}' failed: {}", ssid, e);
                attempt += 1;
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to connect to '{}' after {} attempts", ssid, attempt)
                });
            }
        }
    }

    info!(target: LOG_TARGET, "Waiting for DHCP lease...");
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!(target: LOG_TARGET, "WiFi connected!");
    info!(target: LOG_TARGET, "  IP address: {}", ip_info.ip);
    info!(target: LOG_TARGET, "  Gateway:    {}", ip_info.subnet.gateway);
    info!(target: LOG_TARGET, "  Netmask:    {}", ip_info.subnet.mask);

    Ok((Box::new(esp_wifi), ip_info.ip.to_string()))
}
