//! Firmware configuration.
//!
//! Values are baked in at build time; the firmware binary's build script
//! exports them as compile-time environment variables.

use thiserror::Error;
use ws_echo_core::EchoConfig;

/// GPIO driving the on-board LED of most ESP32 dev kits.
pub const DEFAULT_LED_GPIO: i32 = 2;

/// Largest frame the device will buffer.
pub const DEFAULT_MAX_PAYLOAD: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WiFi SSID must be 1-32 bytes, got {0}")]
    Ssid(usize),

    #[error("WiFi password must be at most 64 bytes, got {0}")]
    Password(usize),

    #[error("invalid LED GPIO '{0}'")]
    LedGpio(String),
}

/// Station credentials.
#[derive(Debug, Clone)]
pub struct WifiConfig {
    pub ssid: String,
    /// Empty for open networks.
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct FirmwareConfig {
    pub wifi: WifiConfig,
    pub led_gpio: i32,
    pub http_port: u16,
    pub echo: EchoConfig,
}

impl FirmwareConfig {
    /// Validate build-time settings. `led_gpio` is the raw `LED_GPIO` value.
    pub fn new(ssid: &str, password: &str, led_gpio: &str) -> Result<Self, ConfigError> {
        if ssid.is_empty() || ssid.len() > 32 {
            return Err(ConfigError::Ssid(ssid.len()));
        }
        if password.len() > 64 {
            return Err(ConfigError::Password(password.len()));
        }
        let led_gpio = led_gpio
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|gpio| *gpio >= 0)
            .ok_or_else(|| ConfigError::LedGpio(led_gpio.to_string()))?;

        Ok(Self {
            wifi: WifiConfig {
                ssid: ssid.to_string(),
                password: password.to_string(),
            },
            led_gpio,
            http_port: 80,
            echo: EchoConfig {
                max_payload_len: Some(DEFAULT_MAX_PAYLOAD),
            },
        })
    }
}
