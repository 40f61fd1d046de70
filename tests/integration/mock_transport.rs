//! Mock adapters for integration tests.
//!
//! Records every publish and subscribe so tests can assert on the full
//! wire history without a broker, and lets tests inject inbound messages.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use nosyna::app::ports::{
    ClimatePort, InboundMessage, SensorError, StorageError, StoragePort, TransportError,
    TransportPort,
};
use nosyna::config::{DeviceConfig, MIN_BUFFER_SIZE};
use nosyna::engine::Engine;
use nosyna::engine::discovery::DeviceIdentity;

pub const DEVICE_ID: &str = "nosyna-aabbccddeeff";

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    pub up: bool,
    pub connects: u32,
    /// Refuse this many connect attempts before accepting.
    pub refuse_connects: u32,
    pub fail_publish: bool,
    pub buffer: usize,
    pub session: u32,
    pub published: Vec<(String, String)>,
    pub subscribed: Vec<String>,
    pending: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            up: false,
            connects: 0,
            refuse_connects: 0,
            fail_publish: false,
            buffer: MIN_BUFFER_SIZE,
            session: 0,
            published: Vec::new(),
            subscribed: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Queue a message for the next `poll`.
    pub fn inject(&mut self, topic: &str, payload: &str) {
        self.pending.push_back(InboundMessage::new(topic, payload));
    }

    /// Payloads published to `topic`, oldest first.
    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_str())
            .collect()
    }

    /// Drop and re-establish the session behind the engine's back, the
    /// way a self-reconnecting client does between two ticks.
    pub fn renew_session(&mut self) {
        self.session += 1;
    }

    pub fn clear(&mut self) {
        self.published.clear();
        self.subscribed.clear();
    }
}

impl TransportPort for MockTransport {
    fn connect(&mut self, _client_id: &str, _user: &str, _password: &str) -> Result<(), TransportError> {
        self.connects += 1;
        if self.connects <= self.refuse_connects {
            return Err(TransportError::ConnectFailed);
        }
        self.up = true;
        self.session += 1;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.up {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publish {
            return Err(TransportError::PublishFailed);
        }
        if payload.len() > self.buffer {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                limit: self.buffer,
            });
        }
        self.published.push((topic.into(), payload.into()));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.up {
            return Err(TransportError::NotConnected);
        }
        self.subscribed.push(topic.into());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn poll(&mut self, inbox: &mut Vec<InboundMessage>) {
        inbox.extend(self.pending.drain(..));
    }

    fn buffer_size(&self) -> usize {
        self.buffer
    }

    fn session(&self) -> u32 {
        self.session
    }
}

// ── MockPwm ───────────────────────────────────────────────────

/// PWM output whose duty is observable through a shared cell.
#[derive(Clone, Default)]
pub struct MockPwm(pub Rc<Cell<u16>>);

impl embedded_hal::pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.0.set(duty);
        Ok(())
    }
}

// ── MockPin ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockPin(pub Rc<Cell<bool>>);

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

// ── MockPrefs ─────────────────────────────────────────────────

/// In-memory storage shared between clones, to simulate a reboot.
#[derive(Clone, Default)]
pub struct MockPrefs(pub Rc<RefCell<HashMap<String, Vec<u8>>>>);

impl StoragePort for MockPrefs {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let map = self.0.borrow();
        let data = map.get(&format!("{ns}/{key}")).ok_or(StorageError::NotFound)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.0.borrow_mut().insert(format!("{ns}/{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().remove(&format!("{ns}/{key}"));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.0.borrow().contains_key(&format!("{ns}/{key}"))
    }
}

// ── MockClimate ───────────────────────────────────────────────

/// Scripted climate source.  `None` entries fail with a timeout.
#[derive(Default)]
pub struct MockClimate {
    pub temperature: VecDeque<Option<f32>>,
    pub humidity: VecDeque<Option<f32>>,
    pub reads: u32,
}

impl ClimatePort for MockClimate {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.reads += 1;
        self.temperature
            .pop_front()
            .flatten()
            .ok_or(SensorError::Timeout)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.humidity
            .pop_front()
            .flatten()
            .ok_or(SensorError::Timeout)
    }
}

// ── Engine helpers ────────────────────────────────────────────

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new(DEVICE_ID, "Nosyna (aabbccddeeff)", "ESP32_DEV", "Nosyna")
}

/// Engine over a fresh mock, not yet connected.
pub fn offline_engine() -> Engine<MockTransport> {
    Engine::new(MockTransport::new(), &DeviceConfig::default(), identity())
}

/// Engine whose session is already established.
pub fn online_engine() -> Engine<MockTransport> {
    let mut engine = offline_engine();
    engine.connect_blocking(|| 0, |_| {});
    engine
}

pub fn state_topic() -> String {
    format!("nosyna/{DEVICE_ID}/state")
}

pub fn command_topic(entity: &str) -> String {
    format!("nosyna/{DEVICE_ID}/{entity}/set")
}

pub fn brightness_topic(entity: &str) -> String {
    format!("nosyna/{DEVICE_ID}/{entity}/brightness/set")
}

pub fn discovery_topic(kind: &str, entity: &str) -> String {
    format!("homeassistant/{kind}/{DEVICE_ID}/{entity}/config")
}

/// Parse the last state batch published.
pub fn last_state(engine: &Engine<MockTransport>) -> Option<serde_json::Value> {
    let topic = state_topic();
    let payloads = engine.transport().published_to(&topic);
    payloads.last().map(|p| serde_json::from_str(p).unwrap())
}
