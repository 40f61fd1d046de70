//! Discovery descriptors.
//!
//! One retained-style config record per entity, published to
//! `<prefix>/<kind>/<device>/<entity>/config`, lets the hub build its UI
//! without manual setup.  All entities point their `state_topic` at the
//! single shared state object and pick their key out of it with a
//! `value_json.<entity>_<property>` template.

use log::{debug, error};
use serde::Serialize;

use super::entity::{Entity, EntityKind};
use super::topics::{
    BRIGHTNESS_MAX, OFF, ON, PROP_BRIGHTNESS, PROP_STATE, TopicScheme, value_template,
};
use crate::app::ports::{TransportError, TransportPort};

/// The device block shared by every descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    #[serde(skip)]
    pub device_id: String,
    #[serde(rename = "name")]
    pub device_name: String,
    pub model: String,
    pub sw_version: String,
    pub manufacturer: String,
    identifiers: [String; 1],
}

impl DeviceIdentity {
    pub fn new(
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        model: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        let device_id = device_id.into();
        Self {
            identifiers: [device_id.clone()],
            device_id,
            device_name: device_name.into(),
            model: model.into(),
            sw_version: env!("CARGO_PKG_VERSION").into(),
            manufacturer: manufacturer.into(),
        }
    }

    /// Stable per-entity id the hub uses to dedupe registrations.
    pub fn unique_id(&self, entity_id: &str) -> String {
        format!("{}-{}", self.device_id, entity_id)
    }
}

/// Wire form of a discovery record.  Optional fields are omitted, not nulled.
#[derive(Debug, Clone, Serialize)]
pub struct Descriptor<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    device_class: &'a str,
    unique_id: String,
    state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness_value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness_scale: Option<u8>,
    device: &'a DeviceIdentity,
}

impl<'a> Descriptor<'a> {
    pub fn build(entity: &'a Entity, topics: &TopicScheme, device: &'a DeviceIdentity) -> Self {
        let id = entity.id.as_str();
        let mut d = Self {
            name: &entity.name,
            device_class: &entity.device_class,
            unique_id: device.unique_id(id),
            state_topic: topics.state(),
            value_template: None,
            state_value_template: None,
            unit_of_measurement: entity.unit_of_measurement.as_deref(),
            command_topic: None,
            payload_on: None,
            payload_off: None,
            state_on: None,
            state_off: None,
            brightness_state_topic: None,
            brightness_command_topic: None,
            brightness_value_template: None,
            brightness_scale: None,
            device,
        };

        match entity.kind {
            EntityKind::Sensor => {
                d.value_template = Some(value_template(id, PROP_STATE));
            }
            EntityKind::Switch => {
                d.value_template = Some(value_template(id, PROP_STATE));
                d.command_topic = Some(topics.command(id));
                d.payload_on = Some(ON);
                d.payload_off = Some(OFF);
                d.state_on = Some(ON);
                d.state_off = Some(OFF);
            }
            EntityKind::Light => {
                d.state_value_template = Some(value_template(id, PROP_STATE));
                d.command_topic = Some(topics.command(id));
                d.payload_on = Some(ON);
                d.payload_off = Some(OFF);
                d.brightness_state_topic = Some(topics.state());
                d.brightness_command_topic = Some(topics.brightness_command(id));
                d.brightness_value_template = Some(value_template(id, PROP_BRIGHTNESS));
                d.brightness_scale = Some(BRIGHTNESS_MAX);
            }
        }
        d
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Builds descriptors and pushes them through the transport.
#[derive(Debug, Clone)]
pub struct DiscoveryPublisher {
    device: DeviceIdentity,
}

impl DiscoveryPublisher {
    pub fn new(device: DeviceIdentity) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Publish the descriptor for `entity`.  Oversized payloads are refused
    /// before they reach the session, which would truncate them silently.
    pub fn announce(
        &self,
        entity: &Entity,
        topics: &TopicScheme,
        transport: &mut impl TransportPort,
    ) -> Result<(), TransportError> {
        let descriptor = Descriptor::build(entity, topics, &self.device);
        let topic = topics.discovery(entity.kind, &entity.id);
        let payload = descriptor.to_json();

        let limit = transport.buffer_size();
        if payload.len() > limit {
            error!(
                "Discovery for '{}' is {} bytes, buffer holds {}",
                entity.id,
                payload.len(),
                limit
            );
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                limit,
            });
        }

        match transport.publish(&topic, &payload) {
            Ok(()) => {
                debug!("Publish to topic '{}':\n{}\n", topic, descriptor.to_json_pretty());
                Ok(())
            }
            Err(e) => {
                error!(
                    "Publish to topic '{}' failed ({}):\n{}\n",
                    topic,
                    e,
                    descriptor.to_json_pretty()
                );
                Err(e)
            }
        }
    }
}
