//! Entity records owned by the engine's entity table.

use core::fmt;

use crate::error::RegistrationError;

/// Kind of entity, which also selects the hub component in discovery topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Sensor,
    Switch,
    Light,
}

impl EntityKind {
    /// Hub component name used in discovery topics.
    pub const fn component(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Switch => "switch",
            Self::Light => "light",
        }
    }

    /// Sensors are outputs only; the other kinds accept commands.
    pub const fn accepts_commands(self) -> bool {
        !matches!(self, Self::Sensor)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component())
    }
}

/// Arena index of a registered entity.  Valid for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the firmware supplies when registering an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpec {
    pub id: String,
    pub name: String,
    pub device_class: String,
    pub unit_of_measurement: Option<String>,
}

impl EntitySpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_class: device_class.into(),
            unit_of_measurement: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }
}

/// A registered entity.  Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub device_class: String,
    pub unit_of_measurement: Option<String>,
}

impl Entity {
    pub fn new(spec: EntitySpec, kind: EntityKind) -> Result<Self, RegistrationError> {
        validate_id(&spec.id)?;
        Ok(Self {
            id: spec.id,
            name: spec.name,
            kind,
            device_class: spec.device_class,
            unit_of_measurement: spec.unit_of_measurement,
        })
    }
}

/// Ids end up in topic levels and JSON keys: lowercase ASCII, digits, `_`.
fn validate_id(id: &str) -> Result<(), RegistrationError> {
    let ok = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(RegistrationError::InvalidId(id.into()))
    }
}
