//! State store: the device shadow.
//!
//! Holds the authoritative value of every entity property plus a dirty
//! flag per entry.  Values are typed internally ([`ShadowValue`]) and only
//! rendered to their canonical wire text (`"ON"`/`"OFF"`, decimal integers,
//! one-decimal floats) when a batch is built.
//!
//! ## Change detection
//!
//! [`StateStore::set`] with a value equal to the stored one is a no-op: no
//! dirty flag, no publish.  Equality is decided on the wire text, so
//! `Bool(true)` and `Text("ON")` are the same value, and a NaN reading
//! settles like any other.  Sensors re-report unchanged readings every
//! sample, so this is what keeps the network quiet.
//!
//! ## Flush protocol
//!
//! ```text
//!   pending() ──▶ publish ──ok──▶ confirm(batch)   (dirty cleared)
//!                         └─err─▶ (nothing)         (retried next tick)
//! ```
//!
//! [`StateStore::flush`] is the unconditional variant (snapshot + clear).

use std::collections::BTreeMap;

use core::fmt;

use super::topics::{OFF, ON, state_key};

// ───────────────────────────────────────────────────────────────
// Keys and values
// ───────────────────────────────────────────────────────────────

/// Composite key `(entity id, property)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    entity_id: String,
    property: String,
}

impl PropertyKey {
    pub fn new(entity_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            property: property.into(),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Key inside the shared state object.
    pub fn wire_key(&self) -> String {
        state_key(&self.entity_id, &self.property)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.entity_id, self.property)
    }
}

/// Typed shadow value.  Compares by its canonical wire text.
#[derive(Debug, Clone)]
pub enum ShadowValue {
    Bool(bool),
    Int(i64),
    /// Stored pre-quantised to one decimal so equality matches the wire form.
    Float(f32),
    Text(String),
}

impl ShadowValue {
    pub fn float(value: f32) -> Self {
        let rounded = (value * 10.0).round() / 10.0;
        // -0.0 renders as "-0.0"
        Self::Float(if rounded == 0.0 { 0.0 } else { rounded })
    }

    /// Canonical wire text.
    pub fn render(&self) -> String {
        match self {
            Self::Bool(true) => ON.into(),
            Self::Bool(false) => OFF.into(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format!("{:.1}", v),
            Self::Text(s) => s.clone(),
        }
    }
}

impl PartialEq for ShadowValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => self.render() == other.render(),
        }
    }
}

impl Eq for ShadowValue {}

impl From<bool> for ShadowValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ShadowValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ShadowValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u8> for ShadowValue {
    fn from(v: u8) -> Self {
        Self::Int(v.into())
    }
}

impl From<f32> for ShadowValue {
    fn from(v: f32) -> Self {
        Self::float(v)
    }
}

impl From<&str> for ShadowValue {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for ShadowValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for ShadowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ───────────────────────────────────────────────────────────────
// Batch
// ───────────────────────────────────────────────────────────────

/// Snapshot of dirty entries, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBatch {
    entries: BTreeMap<PropertyKey, ShadowValue>,
}

impl StateBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&ShadowValue> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.entries.keys()
    }

    /// `<entityId>_<property>` → rendered value.
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.wire_key(), v.render()))
            .collect()
    }

    fn to_value(&self) -> serde_json::Value {
        let object: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.wire_key(), serde_json::Value::String(v.render())))
            .collect();
        serde_json::Value::Object(object)
    }

    /// The batch as the JSON object published on the state topic.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Indented form for debug logs.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_default()
    }
}

// ───────────────────────────────────────────────────────────────
// Store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ShadowEntry {
    value: ShadowValue,
    dirty: bool,
}

/// The shadow map.  Touched only from the tick thread.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: BTreeMap<PropertyKey, ShadowEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`.  Returns `true` if the entry changed (and
    /// is now dirty), `false` if the value was already current.
    pub fn set(&mut self, key: PropertyKey, value: impl Into<ShadowValue>) -> bool {
        let value = value.into();
        match self.entries.get_mut(&key) {
            Some(entry) if entry.value == value => false,
            Some(entry) => {
                entry.value = value;
                entry.dirty = true;
                true
            }
            None => {
                self.entries.insert(key, ShadowEntry { value, dirty: true });
                true
            }
        }
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&ShadowValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Snapshot every dirty entry without clearing anything.
    pub fn pending(&self) -> StateBatch {
        StateBatch {
            entries: self
                .entries
                .iter()
                .filter(|(_, e)| e.dirty)
                .map(|(k, e)| (k.clone(), e.value.clone()))
                .collect(),
        }
    }

    /// Clear the dirty flag of every entry in `batch` whose value has not
    /// changed since the snapshot was taken.
    pub fn confirm(&mut self, batch: &StateBatch) {
        for (key, sent) in &batch.entries {
            if let Some(entry) = self.entries.get_mut(key) {
                if entry.value == *sent {
                    entry.dirty = false;
                }
            }
        }
    }

    /// Return all dirty entries and clear the dirty set.
    pub fn flush(&mut self) -> StateBatch {
        let batch = self.pending();
        self.confirm(&batch);
        batch
    }

    /// Re-flag every known key as dirty without touching values.
    pub fn mark_all_dirty(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dirty = true;
        }
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|e| e.dirty).count()
    }

    pub fn has_dirty(&self) -> bool {
        self.entries.values().any(|e| e.dirty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, prop: &str) -> PropertyKey {
        PropertyKey::new(id, prop)
    }

    #[test]
    fn identical_set_is_noop() {
        let mut s = StateStore::new();
        assert!(s.set(key("t", "state"), 21.4f32));
        s.flush();
        assert!(!s.set(key("t", "state"), 21.4f32));
        assert!(!s.has_dirty());
        assert!(s.flush().is_empty());
    }

    #[test]
    fn flush_returns_exactly_changed_keys() {
        let mut s = StateStore::new();
        s.set(key("a", "state"), true);
        s.set(key("b", "state"), false);
        s.flush();

        s.set(key("a", "state"), false);
        s.set(key("b", "state"), false);
        let batch = s.flush();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get(&key("a", "state")), Some(&ShadowValue::Bool(false)));
        assert_eq!(s.dirty_count(), 0);
    }

    #[test]
    fn light_scenario_single_batch() {
        let mut s = StateStore::new();
        s.set(key("led", "state"), "ON");
        s.set(key("led", "brightness"), 128u8);
        assert_eq!(s.flush().to_json(), r#"{"led_brightness":"128","led_state":"ON"}"#);
    }

    #[test]
    fn mark_all_dirty_resends_unchanged() {
        let mut s = StateStore::new();
        s.set(key("t", "state"), 21.4f32);
        s.flush();
        s.mark_all_dirty();
        let wire = s.flush().to_wire();
        assert_eq!(wire.get("t_state").map(String::as_str), Some("21.4"));
    }

    #[test]
    fn unconfirmed_batch_stays_dirty() {
        let mut s = StateStore::new();
        s.set(key("led", "state"), true);
        let batch = s.pending();
        assert_eq!(batch.len(), 1);
        // publish failed: no confirm
        assert_eq!(s.pending(), batch);
    }

    #[test]
    fn confirm_keeps_newer_value_dirty() {
        let mut s = StateStore::new();
        s.set(key("led", "brightness"), 10u8);
        let batch = s.pending();
        s.set(key("led", "brightness"), 20u8);
        s.confirm(&batch);
        assert_eq!(s.dirty_count(), 1);
    }

    #[test]
    fn rendering_is_canonical() {
        assert_eq!(ShadowValue::Bool(true).render(), "ON");
        assert_eq!(ShadowValue::Bool(false).render(), "OFF");
        assert_eq!(ShadowValue::Int(-7).render(), "-7");
        assert_eq!(ShadowValue::float(21.44).render(), "21.4");
        assert_eq!(ShadowValue::from("x").render(), "x");
    }

    #[test]
    fn equal_wire_text_is_not_a_change() {
        let mut s = StateStore::new();
        s.set(key("led", "state"), true);
        s.set(key("led", "brightness"), 128u8);
        s.set(key("t", "state"), 21.4f32);
        s.flush();

        assert!(!s.set(key("led", "state"), "ON"));
        assert!(!s.set(key("led", "brightness"), "128"));
        assert!(!s.set(key("t", "state"), "21.4"));
        assert!(s.flush().is_empty());
    }

    #[test]
    fn nan_reading_settles() {
        let mut s = StateStore::new();
        assert!(s.set(key("t", "state"), f32::NAN));
        s.flush();
        assert!(!s.set(key("t", "state"), f32::NAN));
        assert!(!s.has_dirty());
    }

    #[test]
    fn tiny_negative_reading_renders_as_zero() {
        assert_eq!(ShadowValue::float(-0.04).render(), "0.0");
        assert_eq!(ShadowValue::float(-0.05).render(), "-0.1");
        assert_eq!(ShadowValue::float(-0.04), ShadowValue::float(0.0));
    }

    #[test]
    fn floats_equal_at_wire_precision() {
        let mut s = StateStore::new();
        s.set(key("h", "state"), 40.01f32);
        s.flush();
        assert!(!s.set(key("h", "state"), 40.04f32));
        assert!(s.set(key("h", "state"), 40.2f32));
    }
}
