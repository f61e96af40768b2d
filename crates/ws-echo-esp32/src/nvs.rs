//! NVS flash initialization.
//!
//! The WiFi driver keeps calibration data in NVS, so the partition has to be
//! usable before the radio starts.

use esp_idf_svc::sys::{
    esp, esp_err_t, nvs_flash_erase, nvs_flash_init, EspError, ESP_ERR_NVS_NEW_VERSION_FOUND,
    ESP_ERR_NVS_NO_FREE_PAGES,
};
use ws_echo_core::{StorageBackend, StorageStatus};

/// The default NVS partition, driven through the ESP-IDF flash API.
#[derive(Debug, Default)]
pub struct NvsFlash;

impl NvsFlash {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for NvsFlash {
    type Error = EspError;

    fn init(&mut self) -> Result<StorageStatus, EspError> {
        let code = unsafe { nvs_flash_init() };
        if code == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
            || code == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
        {
            return Ok(StorageStatus::NeedsErase);
        }
        esp!(code)?;
        Ok(StorageStatus::Ready)
    }

    fn erase(&mut self) -> Result<(), EspError> {
        esp!(unsafe { nvs_flash_erase() })
    }
}
