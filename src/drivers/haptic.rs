// FallGuard - Haptic Motor Driver
//
// GPIO-driven vibration motor. Used to tell the wearer a fall was detected.

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

pub struct HapticDriver<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> HapticDriver<'d> {
    pub fn new(pin: PinDriver<'d, AnyOutputPin, Output>) -> Self {
        Self { pin }
    }

    /// Vibrate for a custom duration (blocks the calling thread).
    pub fn buzz(&mut self, duration: Duration) -> anyhow::Result<()> {
        self.pin.set_high()?;
        thread::sleep(duration);
        self.pin.set_low()?;
        Ok(())
    }

    /// Play `(on_ms, off_ms)` pairs back to back.
    pub fn play(&mut self, pattern: &[(u64, u64)]) -> anyhow::Result<()> {
        for &(on_ms, off_ms) in pattern {
            self.buzz(Duration::from_millis(on_ms))?;
            thread::sleep(Duration::from_millis(off_ms));
        }
        Ok(())
    }
}
