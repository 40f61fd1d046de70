//! Polled, debounced push-button.
//!
//! ## Hardware
//!
//! Momentary switch to 3V3 with the internal pull-down enabled, so the pin
//! reads HIGH while pressed.  Any `embedded-hal` [`InputPin`] works.
//!
//! ## Click detection
//!
//! ```text
//!   level   ____/‾‾‾‾‾‾‾‾‾‾\____
//!                            ^ click (release edge)
//! ```
//!
//! A level change must hold for [`DEBOUNCE_MS`] before it is accepted.
//! A click fires when the accepted level falls back to LOW after having
//! been HIGH.  The first successful read only primes the level, so a
//! button held during boot does not click.

use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

pub const DEBOUNCE_MS: u64 = 50;

pub struct Button<P: InputPin> {
    pin: P,
    gpio: i32,
    /// Accepted (debounced) level; `None` until the first read.
    level: Option<bool>,
    /// Raw level that differs from `level`, and since when.
    pending: Option<(bool, u64)>,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P, gpio: i32) -> Self {
        Self {
            pin,
            gpio,
            level: None,
            pending: None,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Sample the pin.  Call every loop iteration; returns `true` on a click.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let raw = match self.pin.is_high() {
            Ok(v) => v,
            Err(e) => {
                warn!("Button GPIO {}: read failed ({:?})", self.gpio, e);
                return false;
            }
        };

        let Some(level) = self.level else {
            self.level = Some(raw);
            return false;
        };

        if raw == level {
            self.pending = None;
            return false;
        }

        match self.pending {
            Some((candidate, since)) if candidate == raw => {
                if now_ms.saturating_sub(since) < DEBOUNCE_MS {
                    return false;
                }
            }
            _ => {
                self.pending = Some((raw, now_ms));
                return false;
            }
        }

        debug!("Button GPIO {}: {} -> {}", self.gpio, u8::from(level), u8::from(raw));
        self.level = Some(raw);
        self.pending = None;

        if !raw {
            info!("Button GPIO {} click", self.gpio);
            return true;
        }
        false
    }
}
