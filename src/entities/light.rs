//! Dimmable light on a PWM channel with persisted state.
//!
//! The physical output is `state ? brightness : 0` on a 0–255 scale.  Both
//! properties survive a reboot through the [`StoragePort`] under
//! `light.<gpio>.st` and `light.<gpio>.bri`; registration restores them
//! instead of forcing the light off.

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, info};

use crate::adapters::nvs::PREFS_NAMESPACE;
use crate::app::commands::Command;
use crate::app::ports::StoragePort;
use crate::engine::topics::{BRIGHTNESS_MAX, PROP_BRIGHTNESS, PROP_STATE};
use crate::engine::{EntityHandler, EntityShadow};
use crate::error::Error;

const STATE_PREF: &str = "st";
const BRIGHTNESS_PREF: &str = "bri";

pub struct Light<O: SetDutyCycle, S: StoragePort> {
    output: O,
    prefs: S,
    gpio: i32,
    state: bool,
    brightness: u8,
}

impl<O: SetDutyCycle, S: StoragePort> Light<O, S> {
    /// Load the persisted state; nothing is driven until bootstrap.
    pub fn new(output: O, prefs: S, gpio: i32) -> Self {
        let mut light = Self {
            output,
            prefs,
            gpio,
            state: false,
            brightness: BRIGHTNESS_MAX,
        };
        light.state = light
            .prefs
            .get_bool(PREFS_NAMESPACE, &light.pref_key(STATE_PREF), false);
        light.brightness = light
            .prefs
            .get_i32(
                PREFS_NAMESPACE,
                &light.pref_key(BRIGHTNESS_PREF),
                i32::from(BRIGHTNESS_MAX),
            )
            .clamp(0, i32::from(BRIGHTNESS_MAX)) as u8;
        debug!(
            "Configuring LIGHT GPIO {}: stored state {}, brightness {}",
            gpio, light.state, light.brightness
        );
        light
    }

    pub fn is_on(&self) -> bool {
        self.state
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Current output level, 0–255.
    pub fn level(&self) -> u8 {
        output_level(self.state, self.brightness)
    }

    fn pref_key(&self, attribute: &str) -> String {
        format!("light.{}.{}", self.gpio, attribute)
    }

    /// Push `state`/`brightness` to the output.  The caller commits them
    /// only once this succeeds.
    fn drive(&mut self, state: bool, brightness: u8) -> Result<(), Error> {
        let level = u16::from(output_level(state, brightness));
        self.output
            .set_duty_cycle_fraction(level, u16::from(BRIGHTNESS_MAX))
            .map_err(|e| Error::Actuator(format!("GPIO {}: {:?}", self.gpio, e)))
    }

    fn set_state(&mut self, on: bool, shadow: &mut EntityShadow<'_>) -> Result<(), Error> {
        info!(
            "Light GPIO {} ({}) state: {} -> {}",
            self.gpio,
            shadow.entity_id(),
            u8::from(self.state),
            u8::from(on)
        );
        self.drive(on, self.brightness)?;
        self.state = on;
        shadow.set(PROP_STATE, on);
        let key = self.pref_key(STATE_PREF);
        self.prefs.put_bool(PREFS_NAMESPACE, &key, on)?;
        Ok(())
    }

    fn set_brightness(&mut self, value: u8, shadow: &mut EntityShadow<'_>) -> Result<(), Error> {
        info!(
            "Light GPIO {} ({}) brightness: {} -> {}",
            self.gpio,
            shadow.entity_id(),
            self.brightness,
            value
        );
        self.drive(self.state, value)?;
        self.brightness = value;
        shadow.set(PROP_BRIGHTNESS, value);
        let key = self.pref_key(BRIGHTNESS_PREF);
        self.prefs.put_i32(PREFS_NAMESPACE, &key, i32::from(value))?;
        Ok(())
    }
}

fn output_level(state: bool, brightness: u8) -> u8 {
    if state { brightness } else { 0 }
}

impl<O: SetDutyCycle, S: StoragePort> EntityHandler for Light<O, S> {
    fn handle(&mut self, command: Command, shadow: &mut EntityShadow<'_>) -> Result<(), Error> {
        match command {
            Command::SetState(on) => self.set_state(on, shadow),
            Command::Toggle => self.set_state(!self.state, shadow),
            Command::SetBrightness(value) => self.set_brightness(value, shadow),
        }
    }

    /// Publish and drive the restored state.
    fn bootstrap(&mut self, shadow: &mut EntityShadow<'_>) -> Result<(), Error> {
        self.drive(self.state, self.brightness)?;
        shadow.set(PROP_STATE, self.state);
        shadow.set(PROP_BRIGHTNESS, self.brightness);
        info!(
            "Light GPIO {} ({}) configured: state {}, brightness {}",
            self.gpio,
            shadow.entity_id(),
            u8::from(self.state),
            self.brightness
        );
        Ok(())
    }
}
