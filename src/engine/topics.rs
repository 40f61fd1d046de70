//! Topic scheme and wire constants.
//!
//! These strings are what the hub matches on; changing any of them breaks
//! discovery or command routing on an existing installation.
//!
//! | Purpose        | Topic                                              |
//! |----------------|----------------------------------------------------|
//! | Discovery      | `<prefix>/<kind>/<device>/<entity>/config`         |
//! | Shared state   | `<root>/<device>/state`                            |
//! | Command        | `<root>/<device>/<entity>/set`                     |
//! | Brightness cmd | `<root>/<device>/<entity>/brightness/set`          |
//! | Hub status     | `<prefix>/status`                                  |

use super::entity::EntityKind;

pub const ON: &str = "ON";
pub const OFF: &str = "OFF";

/// Hub availability payloads.
pub const ONLINE: &str = "ONLINE";

/// Property names.
pub const PROP_STATE: &str = "state";
pub const PROP_BRIGHTNESS: &str = "brightness";

pub const BRIGHTNESS_MAX: u8 = 255;

/// Topic builder bound to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    discovery_prefix: String,
    root: String,
    device_id: String,
}

impl TopicScheme {
    pub fn new(
        discovery_prefix: impl Into<String>,
        root: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            discovery_prefix: discovery_prefix.into(),
            root: root.into(),
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn discovery(&self, kind: EntityKind, entity_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_prefix,
            kind.component(),
            self.device_id,
            entity_id
        )
    }

    /// The single state topic every entity is multiplexed into.
    pub fn state(&self) -> String {
        format!("{}/{}/state", self.root, self.device_id)
    }

    pub fn command(&self, entity_id: &str) -> String {
        format!("{}/{}/{}/set", self.root, self.device_id, entity_id)
    }

    pub fn brightness_command(&self, entity_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/set",
            self.root, self.device_id, entity_id, PROP_BRIGHTNESS
        )
    }

    pub fn hub_status(&self) -> String {
        format!("{}/status", self.discovery_prefix)
    }
}

/// Key of a property inside the shared state object: `<entityId>_<property>`.
pub fn state_key(entity_id: &str, property: &str) -> String {
    format!("{}_{}", entity_id, property)
}

/// Hub-side template that extracts one key from the shared state object.
pub fn value_template(entity_id: &str, property: &str) -> String {
    format!("{{{{ value_json.{} | is_defined }}}}", state_key(entity_id, property))
}
