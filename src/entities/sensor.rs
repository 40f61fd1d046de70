//! Temperature + humidity pair fed by a [`ClimatePort`].
//!
//! Registers two Sensor entities and samples the port at most once per
//! interval.  A reading is recorded only when it moves by more than
//! [`CHANGE_THRESHOLD`] from the last recorded one, so sensor noise does
//! not turn into network traffic.  Failed or NaN reads are skipped.

use log::{info, warn};

use crate::app::ports::{ClimatePort, SensorError, TransportPort};
use crate::engine::Engine;
use crate::engine::entity::{EntityId, EntitySpec};
use crate::engine::topics::PROP_STATE;
use crate::error::RegistrationError;

pub const CHANGE_THRESHOLD: f32 = 0.1;

/// Last recorded value of one channel.
#[derive(Debug, Clone, Copy)]
struct Channel {
    id: EntityId,
    last: Option<f32>,
}

impl Channel {
    /// `Some(value)` if it should be recorded.
    fn accept(&mut self, reading: Result<f32, SensorError>, label: &str, gpio: i32) -> Option<f32> {
        let value = match reading {
            Ok(v) if v.is_finite() => v,
            Ok(_) => {
                warn!("{} GPIO {}: NaN reading skipped", label, gpio);
                return None;
            }
            Err(e) => {
                warn!("{} GPIO {}: {}", label, gpio, e);
                return None;
            }
        };

        match self.last {
            Some(last) if (value - last).abs() <= CHANGE_THRESHOLD => None,
            Some(last) => {
                info!("{} GPIO {}: {:.1} -> {:.1}", label, gpio, last, value);
                self.last = Some(value);
                Some(value)
            }
            None => {
                info!("{} GPIO {}: {:.1}", label, gpio, value);
                self.last = Some(value);
                Some(value)
            }
        }
    }
}

pub struct ClimateSensor<C: ClimatePort> {
    port: C,
    gpio: i32,
    interval_ms: u64,
    last_sample_ms: Option<u64>,
    temperature: Channel,
    humidity: Channel,
}

impl<C: ClimatePort> ClimateSensor<C> {
    /// Register the two sensor entities and wrap `port`.
    pub fn register<T: TransportPort>(
        engine: &mut Engine<T>,
        port: C,
        gpio: i32,
        temperature: EntitySpec,
        humidity: EntitySpec,
        interval_ms: u32,
    ) -> Result<Self, RegistrationError> {
        let t_id = temperature.id.clone();
        let h_id = humidity.id.clone();
        let temperature = engine.add_sensor(temperature)?;
        let humidity = engine.add_sensor(humidity)?;
        info!(
            "Configured temperature and humidity sensor GPIO {} ({}, {})",
            gpio, t_id, h_id
        );
        Ok(Self {
            port,
            gpio,
            interval_ms: interval_ms.into(),
            last_sample_ms: None,
            temperature: Channel {
                id: temperature,
                last: None,
            },
            humidity: Channel {
                id: humidity,
                last: None,
            },
        })
    }

    pub fn temperature_id(&self) -> EntityId {
        self.temperature.id
    }

    pub fn humidity_id(&self) -> EntityId {
        self.humidity.id
    }

    /// Sample if the interval has elapsed.  Returns `true` if the port was read.
    pub fn sample<T: TransportPort>(&mut self, now_ms: u64, engine: &mut Engine<T>) -> bool {
        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return false;
            }
        }
        self.last_sample_ms = Some(now_ms);

        let reading = self.port.read_temperature();
        if let Some(v) = self.temperature.accept(reading, "Temperature", self.gpio) {
            engine.set(self.temperature.id, PROP_STATE, v);
        }
        let reading = self.port.read_humidity();
        if let Some(v) = self.humidity.accept(reading, "Humidity", self.gpio) {
            engine.set(self.humidity.id, PROP_STATE, v);
        }
        true
    }

    pub fn port_mut(&mut self) -> &mut C {
        &mut self.port
    }
}
