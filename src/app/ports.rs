//! Port traits: the hexagonal boundary between the sync engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Engine (domain)
//! ```
//!
//! Driven adapters (MQTT session, NVS, climate sensor) implement these
//! traits.  The [`Engine`](crate::engine::Engine) and the entity facades
//! consume them via generics, so the domain core never touches the radio,
//! flash, or sensor bus directly.
//!
//! Digital and PWM pins are not modelled here: they use the `embedded-hal`
//! 1.0 traits (`InputPin`, `OutputPin`, `SetDutyCycle`) directly.

use crate::config::DeviceConfig;

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ message broker)
// ───────────────────────────────────────────────────────────────

/// A message taken off the transport's inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe session with the broker.
///
/// Implementations never block for longer than a single connection
/// attempt.  Reconnect policy lives in the engine's
/// [`ConnectionManager`](crate::engine::connection::ConnectionManager),
/// not in the adapter.
pub trait TransportPort {
    /// Attempt one connection with the given identity.
    fn connect(&mut self, client_id: &str, user: &str, password: &str)
        -> Result<(), TransportError>;

    /// Publish `payload` to `topic` (fire-and-forget, QoS 0).
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError>;

    /// Issue a wire-level subscribe for `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Liveness check.  Sampled once per engine tick.
    fn is_connected(&self) -> bool;

    /// Service the inbound queue, appending every received message to `inbox`.
    fn poll(&mut self, inbox: &mut Vec<InboundMessage>);

    /// Largest payload the session can carry in one publish.
    fn buffer_size(&self) -> usize;

    /// Count of sessions established so far.  Clients that reconnect on
    /// their own bump it, letting the engine notice a renewed session whose
    /// subscriptions the broker has already forgotten.
    fn session(&self) -> u32 {
        0
    }
}

// ───────────────────────────────────────────────────────────────
// Climate port (driven adapter: sensor → domain)
// ───────────────────────────────────────────────────────────────

/// Temperature / relative-humidity source (DHT22 on the reference board).
pub trait ClimatePort {
    /// Degrees Celsius.
    fn read_temperature(&mut self) -> Result<f32, SensorError>;

    /// Relative humidity in percent.
    fn read_humidity(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the device configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage (the "preferences" of the light entities).
///
/// Keys are namespaced to prevent collisions between subsystems.  Writes
/// MUST be atomic; ESP-IDF NVS guarantees this per commit.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Read a boolean stored as a single byte; `default` when absent or unreadable.
    fn get_bool(&self, namespace: &str, key: &str, default: bool) -> bool {
        let mut buf = [0u8; 1];
        match self.read(namespace, key, &mut buf) {
            Ok(1) => buf[0] != 0,
            _ => default,
        }
    }

    fn put_bool(&mut self, namespace: &str, key: &str, value: bool) -> Result<(), StorageError> {
        self.write(namespace, key, &[u8::from(value)])
    }

    /// Read a little-endian `i32`; `default` when absent or unreadable.
    fn get_i32(&self, namespace: &str, key: &str, default: i32) -> i32 {
        let mut buf = [0u8; 4];
        match self.read(namespace, key, &mut buf) {
            Ok(4) => i32::from_le_bytes(buf),
            _ => default,
        }
    }

    fn put_i32(&mut self, namespace: &str, key: &str, value: i32) -> Result<(), StorageError> {
        self.write(namespace, key, &value.to_le_bytes())
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`TransportPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The session is not connected; nothing was sent.
    NotConnected,
    /// The broker refused or never answered the connection attempt.
    ConnectFailed,
    /// The outbound queue rejected the message.
    PublishFailed,
    SubscribeFailed,
    /// Payload exceeds the session buffer.
    PayloadTooLarge { len: usize, limit: usize },
}

/// Errors from [`ClimatePort`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor did not answer within the protocol timing window.
    Timeout,
    /// The frame arrived but its checksum did not match.
    Checksum,
    /// Reading is NaN or outside the physically plausible range.
    OutOfRange,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PayloadTooLarge { len, limit } => {
                write!(f, "payload of {} bytes exceeds buffer of {} bytes", len, limit)
            }
        }
    }
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "sensor timeout"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for TransportError {}
impl std::error::Error for SensorError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
