//! The ESP32 board as a boot [`Platform`].

use std::sync::Arc;

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::http::server::EspHttpServer;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::info;
use ws_echo_core::{EchoHandler, Led, Platform, LOG_TARGET};

use crate::config::FirmwareConfig;
use crate::http;
use crate::led::GpioLed;
use crate::nvs::NvsFlash;
use crate::wifi::connect_wifi;

/// Peripherals consumed by the boot sequence.
pub struct Esp32Board {
    config: FirmwareConfig,
    nvs: NvsFlash,
    modem: Option<Modem>,
    sysloop: EspSystemEventLoop,
    wifi: Option<Box<EspWifi<'static>>>,
    ip: Option<String>,
}

impl Esp32Board {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop, config: &FirmwareConfig) -> Self {
        Self {
            config: config.clone(),
            nvs: NvsFlash::new(),
            modem: Some(modem),
            sysloop,
            wifi: None,
            ip: None,
        }
    }

    /// Station address once the network is up.
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    /// Hand over the WiFi driver; dropping it disconnects.
    pub fn take_wifi(&mut self) -> Option<Box<EspWifi<'static>>> {
        self.wifi.take()
    }
}

impl Platform for Esp32Board {
    type Storage = NvsFlash;
    type Pin = GpioLed;
    type Server = EspHttpServer<'static>;
    type Error = anyhow::Error;

    fn storage(&mut self) -> &mut NvsFlash {
        &mut self.nvs
    }

    fn init_led(&mut self) -> Result<Led<GpioLed>> {
        let gpio = self.config.led_gpio;
        info!(target: LOG_TARGET, "Configuring LED on GPIO {}", gpio);
        // The configured pin is reserved for the LED and claimed only here.
        let pin = unsafe { GpioLed::from_gpio(gpio) }
            .with_context(|| format!("GPIO {} cannot drive an output", gpio))?;
        Ok(Led::init(pin)?)
    }

    fn connect_network(&mut self) -> Result<()> {
        let modem = self.modem.take().context("WiFi already started")?;
        let nvs = EspDefaultNvsPartition::take()?;
        let (wifi, ip) = connect_wifi(&self.config.wifi, modem, self.sysloop.clone(), Some(nvs))?;
        self.wifi = Some(wifi);
        self.ip = Some(ip);
        Ok(())
    }

    fn start_server(&mut self, handler: Arc<EchoHandler<GpioLed>>) -> Result<EspHttpServer<'static>> {
        info!(target: LOG_TARGET, "Starting server on port: '{}'", self.config.http_port);
        Ok(http::start_server(self.config.http_port, handler)?)
    }
}
