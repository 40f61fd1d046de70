//! Unified error types for the Nosyna firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! main loop's error handling uniform.  None of these are fatal: the device
//! logs, drops or retries, and keeps running.

use core::fmt;

use crate::app::ports::{ConfigError, SensorError, StorageError, TransportError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// Broker session failure (connect retried, publish logged and dropped).
    Transport(TransportError),
    /// Inbound message the engine cannot act on.
    Protocol(ProtocolError),
    /// Entity or subscription registered twice, or with an unusable id.
    Registration(RegistrationError),
    Sensor(SensorError),
    Storage(StorageError),
    Config(ConfigError),
    /// An actuator rejected a write (PWM channel, GPIO expander, ...).
    Actuator(String),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Registration(e) => write!(f, "registration: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Actuator(msg) => write!(f, "actuator: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// An inbound message that cannot be routed or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No handler is registered for the topic (retained or foreign message).
    UnknownTopic(String),
    /// The payload does not decode to a command for this route.
    InvalidPayload { topic: String, payload: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopic(topic) => write!(f, "unexpected topic '{topic}'"),
            Self::InvalidPayload { topic, payload } => {
                write!(f, "invalid payload on '{topic}': {payload}")
            }
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Registration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// An entity with this id already exists.
    DuplicateEntity(String),
    /// A handler is already registered for this topic.
    DuplicateSubscription(String),
    /// Entity ids must be non-empty `[a-z0-9_]`; they end up in topics and JSON keys.
    InvalidId(String),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateEntity(id) => write!(f, "entity '{id}' already exists"),
            Self::DuplicateSubscription(topic) => write!(f, "subscription '{topic}' already exists"),
            Self::InvalidId(id) => write!(f, "invalid entity id '{id}'"),
        }
    }
}

impl std::error::Error for RegistrationError {}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Self::Registration(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
