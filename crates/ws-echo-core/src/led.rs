//! LED state over an abstract output pin.
//!
//! The physical pin is a collaborator; `Led` owns the logical level so the
//! toggle behaviour can be tested without GPIO hardware.

use std::fmt;
use std::ops::Not;

use log::debug;

use crate::LOG_TARGET;

/// Logic level of the LED output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// LED off (pin driven low).
    #[default]
    Low,
    /// LED on (pin driven high).
    High,
}

impl Level {
    /// Returns `true` if the LED is lit.
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("off"),
            Level::High => f.write_str("on"),
        }
    }
}

/// A single digital output driving the LED.
///
/// Implemented by `PinDriver` on ESP32 and by a logging stand-in on Linux.
pub trait LedPin: Send {
    /// Error raised by the underlying driver.
    type Error: fmt::Debug + fmt::Display;

    /// Drive the pin to the given level.
    fn set_level(&mut self, level: Level) -> Result<(), Self::Error>;
}

/// LED with its current logical level.
#[derive(Debug)]
pub struct Led<P> {
    pin: P,
    level: Level,
}

impl<P: LedPin> Led<P> {
    /// Take ownership of a configured output pin and force it off.
    pub fn init(mut pin: P) -> Result<Self, P::Error> {
        pin.set_level(Level::Low)?;
        Ok(Self {
            pin,
            level: Level::Low,
        })
    }

    /// Current logical level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Flip the logical level and apply it to the pin.
    ///
    /// The logical level flips even if the pin write fails; the error is
    /// returned so the caller can report it.
    pub fn toggle(&mut self) -> Result<Level, P::Error> {
        self.level = !self.level;
        debug!(target: LOG_TARGET, "LED {}", self.level);
        self.pin.set_level(self.level)?;
        Ok(self.level)
    }

    /// Access the underlying pin.
    pub fn pin(&self) -> &P {
        &self.pin
    }

    #[cfg(test)]
    pub(crate) fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Pin that records every level written to it.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingPin {
        pub(crate) writes: Vec<Level>,
        pub(crate) fail: bool,
    }

    impl RecordingPin {
        pub(crate) fn physical(&self) -> Option<Level> {
            self.writes.last().copied()
        }
    }

    impl LedPin for RecordingPin {
        type Error = &'static str;

        fn set_level(&mut self, level: Level) -> Result<(), Self::Error> {
            if self.fail {
                return Err("gpio write failed");
            }
            self.writes.push(level);
            Ok(())
        }
    }

    #[test]
    fn test_init_forces_off() {
        let led = Led::init(RecordingPin::default()).unwrap();
        assert_eq!(led.level(), Level::Low);
        assert_eq!(led.pin().writes, vec![Level::Low]);
    }

    #[test]
    fn test_double_toggle_restores_level() {
        let mut led = Led::init(RecordingPin::default()).unwrap();

        assert_eq!(led.toggle().unwrap(), Level::High);
        assert_eq!(led.toggle().unwrap(), Level::Low);
        assert_eq!(led.pin().physical(), Some(Level::Low));
        assert_eq!(led.pin().writes, vec![Level::Low, Level::High, Level::Low]);
    }

    #[test]
    fn test_toggle_flips_bit_when_pin_fails() {
        let mut led = Led::init(RecordingPin::default()).unwrap();
        led.pin.fail = true;

        assert!(led.toggle().is_err());
        assert_eq!(led.level(), Level::High);
    }

    #[test]
    fn test_level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(!Level::Low, Level::High);
        assert!(Level::High.is_high());
        assert_eq!(Level::High.to_string(), "on");
    }
}
