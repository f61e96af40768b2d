//! Stand-in for the LED GPIO on hosts without one.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use ws_echo_core::{LedPin, Level};

/// Output pin that logs level changes instead of driving hardware.
///
/// Clones share the same level so a test can keep one to observe the pin.
#[derive(Debug, Clone)]
pub struct SimulatedLed {
    gpio: u32,
    lit: Arc<AtomicBool>,
}

impl SimulatedLed {
    pub fn new(gpio: u32) -> Self {
        Self {
            gpio,
            lit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Level last written to the pin.
    pub fn level(&self) -> Level {
        Level::from(self.lit.load(Ordering::Acquire))
    }
}

impl LedPin for SimulatedLed {
    type Error = Infallible;

    fn set_level(&mut self, level: Level) -> Result<(), Infallible> {
        self.lit.store(level.is_high(), Ordering::Release);
        info!(gpio = self.gpio, "LED {}", level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_level() {
        let probe = SimulatedLed::new(2);
        let mut pin = probe.clone();

        pin.set_level(Level::High).unwrap();
        assert_eq!(probe.level(), Level::High);

        pin.set_level(Level::Low).unwrap();
        assert_eq!(probe.level(), Level::Low);
    }
}
