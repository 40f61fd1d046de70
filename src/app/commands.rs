//! Inbound commands to entity handlers.
//!
//! The [`SubscriptionRouter`](crate::engine::router::SubscriptionRouter)
//! resolves a topic to a [`Route`](crate::engine::router::Route); the engine
//! decodes the payload into a [`Command`] and hands it to the entity in its
//! arena slot.  Local inputs (the push-button) inject commands the same way.

use crate::engine::topics::{OFF, ON};

/// Commands that the hub or local inputs can send to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the entity on or off.
    SetState(bool),

    /// Set light brightness on the 0–255 scale.
    SetBrightness(u8),

    /// Invert the current on/off state (local button).
    Toggle,
}

impl Command {
    /// Decode an `ON`/`OFF` command payload.
    pub fn parse_state(payload: &str) -> Option<Self> {
        match payload.trim() {
            ON => Some(Self::SetState(true)),
            OFF => Some(Self::SetState(false)),
            _ => None,
        }
    }

    /// Decode a decimal brightness payload, clamping to 0–255.
    pub fn parse_brightness(payload: &str) -> Option<Self> {
        let value: i64 = payload.trim().parse().ok()?;
        Some(Self::SetBrightness(value.clamp(0, 255) as u8))
    }
}
