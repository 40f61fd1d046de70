//! On/off switch backed by a caller-supplied actuator.

use log::{debug, info};

use crate::app::commands::Command;
use crate::engine::topics::{OFF, ON, PROP_STATE};
use crate::engine::{EntityHandler, EntityShadow};
use crate::error::Error;

pub struct Switch<F: FnMut(bool)> {
    actuator: F,
    state: bool,
}

impl<F: FnMut(bool)> Switch<F> {
    /// `actuator` drives the physical output; it is called with the new
    /// state on every command, including the bootstrap `false`.
    pub fn new(actuator: F) -> Self {
        Self {
            actuator,
            state: false,
        }
    }

    pub fn is_on(&self) -> bool {
        self.state
    }

    fn apply(&mut self, on: bool, shadow: &mut EntityShadow<'_>) {
        info!("{} {}", shadow.entity_id(), if on { ON } else { OFF });
        self.state = on;
        (self.actuator)(on);
        shadow.set(PROP_STATE, on);
    }
}

impl<F: FnMut(bool)> EntityHandler for Switch<F> {
    fn handle(&mut self, command: Command, shadow: &mut EntityShadow<'_>) -> Result<(), Error> {
        match command {
            Command::SetState(on) => self.apply(on, shadow),
            Command::Toggle => self.apply(!self.state, shadow),
            Command::SetBrightness(_) => {
                debug!("{}: brightness not supported", shadow.entity_id());
            }
        }
        Ok(())
    }
}
