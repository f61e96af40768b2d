//! LED output on a GPIO pin.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::sys::EspError;
use ws_echo_core::{LedPin, Level};

/// Push-pull output driving the status LED.
pub struct GpioLed {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl GpioLed {
    /// Claim `gpio` as an output. The driver resets the pin before use.
    ///
    /// # Safety
    ///
    /// `gpio` must be a valid output-capable pin not owned by any other driver.
    pub unsafe fn from_gpio(gpio: i32) -> Result<Self, EspError> {
        Self::new(AnyOutputPin::new(gpio))
    }

    pub fn new(pin: AnyOutputPin) -> Result<Self, EspError> {
        Ok(Self {
            pin: PinDriver::output(pin)?,
        })
    }
}

impl LedPin for GpioLed {
    type Error = EspError;

    fn set_level(&mut self, level: Level) -> Result<(), EspError> {
        if level.is_high() {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}
