//! Hardware adapter: `embedded-hal` 1.0 pin types over the raw ESP-IDF
//! accessors in [`hw_init`](crate::drivers::hw_init).
//!
//! | Type          | Trait          | Backed by                      |
//! |---------------|----------------|--------------------------------|
//! | `GpioInput`   | `InputPin`     | `gpio_get_level`               |
//! | `GpioOutput`  | `OutputPin`    | `gpio_set_level`               |
//! | `PwmChannel`  | `SetDutyCycle` | LEDC channel, 8-bit resolution |
//!
//! On non-espidf targets the same types read and write a table of
//! simulated pin levels and duty cycles, which tests (and the host build)
//! can inspect and drive through the `sim_*` functions.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType as DigitalErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};

use crate::pins::PWM_RESOLUTION_BITS;

/// Full-scale LEDC duty at [`PWM_RESOLUTION_BITS`].
pub const MAX_DUTY: u16 = (1 << PWM_RESOLUTION_BITS) - 1;

// ── Simulation state ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

    const GPIO_COUNT: usize = 40;
    const LEDC_COUNT: usize = 8;

    static LEVELS: [AtomicBool; GPIO_COUNT] = [const { AtomicBool::new(false) }; GPIO_COUNT];
    static DUTIES: [AtomicU16; LEDC_COUNT] = [const { AtomicU16::new(0) }; LEDC_COUNT];

    pub fn level(gpio: i32) -> bool {
        usize::try_from(gpio)
            .ok()
            .and_then(|i| LEVELS.get(i))
            .is_some_and(|l| l.load(Ordering::Acquire))
    }

    pub fn set_level(gpio: i32, high: bool) {
        if let Some(l) = usize::try_from(gpio).ok().and_then(|i| LEVELS.get(i)) {
            l.store(high, Ordering::Release);
        }
    }

    pub fn duty(channel: u32) -> u16 {
        DUTIES
            .get(channel as usize)
            .map_or(0, |d| d.load(Ordering::Acquire))
    }

    pub fn set_duty(channel: u32, duty: u16) {
        if let Some(d) = DUTIES.get(channel as usize) {
            d.store(duty, Ordering::Release);
        }
    }
}

/// Drive a simulated input pin (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_input(gpio: i32, high: bool) {
    sim::set_level(gpio, high);
}

/// Current simulated level of a pin (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_level(gpio: i32) -> bool {
    sim::level(gpio)
}

/// Current simulated duty of an LEDC channel (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_duty(channel: u32) -> u16 {
    sim::duty(channel)
}

// ── Digital input ─────────────────────────────────────────────

pub struct GpioInput {
    gpio: i32,
}

impl GpioInput {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl DigitalErrorType for GpioInput {
    type Error = Infallible;
}

impl InputPin for GpioInput {
    #[cfg(target_os = "espidf")]
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(crate::drivers::hw_init::gpio_read(self.gpio))
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(sim::level(self.gpio))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

// ── Digital output ────────────────────────────────────────────

pub struct GpioOutput {
    gpio: i32,
}

impl GpioOutput {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    fn write(&mut self, high: bool) {
        #[cfg(target_os = "espidf")]
        crate::drivers::hw_init::gpio_write(self.gpio, high);

        #[cfg(not(target_os = "espidf"))]
        sim::set_level(self.gpio, high);
    }
}

impl DigitalErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.write(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.write(false);
        Ok(())
    }
}

// ── PWM ───────────────────────────────────────────────────────

/// One LEDC channel configured by `hw_init`.
pub struct PwmChannel {
    channel: u32,
}

impl PwmChannel {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }
}

impl PwmErrorType for PwmChannel {
    type Error = Infallible;
}

impl SetDutyCycle for PwmChannel {
    fn max_duty_cycle(&self) -> u16 {
        MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        let duty = duty.min(MAX_DUTY);

        #[cfg(target_os = "espidf")]
        crate::drivers::hw_init::ledc_set(self.channel, duty as u8);

        #[cfg(not(target_os = "espidf"))]
        sim::set_duty(self.channel, duty);

        Ok(())
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn output_levels_are_observable() {
        let mut out = GpioOutput::new(33);
        out.set_high().unwrap();
        assert!(sim_level(33));
        out.set_low().unwrap();
        assert!(!sim_level(33));
    }

    #[test]
    fn input_reads_simulated_level() {
        let mut input = GpioInput::new(34);
        sim_set_input(34, true);
        assert!(input.is_high().unwrap());
        sim_set_input(34, false);
        assert!(input.is_low().unwrap());
    }

    #[test]
    fn pwm_fraction_maps_to_8_bit_duty() {
        let mut pwm = PwmChannel::new(7);
        pwm.set_duty_cycle_fraction(128, 255).unwrap();
        assert_eq!(sim_duty(7), 128);
        pwm.set_duty_cycle_fully_off().unwrap();
        assert_eq!(sim_duty(7), 0);
    }
}
