//! Engine integration tests: registration, tick ordering, resync and
//! failure handling against a recording mock transport.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use nosyna::app::ports::TransportError;
use nosyna::engine::connection::{ConnectionEvent, ConnectionState};
use nosyna::engine::discovery::DiscoveryPublisher;
use nosyna::engine::entity::{Entity, EntityKind, EntitySpec};
use nosyna::engine::router::{Route, SubscriptionRouter};
use nosyna::engine::store::ShadowValue;
use nosyna::engine::topics::TopicScheme;
use nosyna::entities::{Light, Switch};
use nosyna::error::RegistrationError;

use crate::mock_transport::*;

type Calls = Rc<RefCell<Vec<bool>>>;

fn recording_switch() -> (Switch<impl FnMut(bool)>, Calls) {
    let calls: Calls = Rc::default();
    let sink = calls.clone();
    (Switch::new(move |on| sink.borrow_mut().push(on)), calls)
}

fn add_led(engine: &mut nosyna::engine::Engine<MockTransport>) -> (nosyna::engine::entity::EntityId, MockPwm) {
    let pwm = MockPwm::default();
    let id = engine
        .add_light(
            EntitySpec::new("led", "External LED", "outlet"),
            Light::new(pwm.clone(), MockPrefs::default(), 4),
        )
        .unwrap();
    (id, pwm)
}

// ── Registration ──────────────────────────────────────────────

#[test]
fn light_registration_subscribes_and_announces() {
    let mut engine = online_engine();
    add_led(&mut engine);

    let t = engine.transport();
    assert!(t.subscribed.contains(&"homeassistant/status".to_string()));
    assert!(t.subscribed.contains(&command_topic("led")));
    assert!(t.subscribed.contains(&brightness_topic("led")));

    let discovery = t.published_to(&discovery_topic("light", "led"));
    assert_eq!(discovery.len(), 1);
    let v: serde_json::Value = serde_json::from_str(discovery[0]).unwrap();
    assert_eq!(v["unique_id"], "nosyna-aabbccddeeff-led");
    assert_eq!(v["brightness_scale"], 255);
}

#[test]
fn duplicate_entity_is_rejected() {
    let mut engine = online_engine();
    engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    let second = engine.add_sensor(EntitySpec::new("t", "Other", "temperature"));
    assert_eq!(second, Err(RegistrationError::DuplicateEntity("t".into())));
    assert_eq!(engine.entities().count(), 1);
}

#[test]
fn invalid_entity_id_is_rejected() {
    let mut engine = online_engine();
    let res = engine.add_sensor(EntitySpec::new("Bad Id", "x", ""));
    assert_eq!(res, Err(RegistrationError::InvalidId("Bad Id".into())));
}

#[test]
fn duplicate_subscription_keeps_first_handler() {
    let mut engine = online_engine();
    let (first, _) = add_led(&mut engine);

    let mut router = SubscriptionRouter::new();
    let mut wire = MockTransport::new();
    router
        .subscribe("x/set", Route::EntityState(first), &mut wire)
        .unwrap();
    let second = router.subscribe("x/set", Route::HubStatus, &mut wire);
    assert_eq!(
        second,
        Err(RegistrationError::DuplicateSubscription("x/set".into()))
    );
    assert_eq!(router.route("x/set"), Some(Route::EntityState(first)));
    assert_eq!(router.len(), 1);
}

#[test]
fn switch_bootstraps_off_exactly_once() {
    let mut engine = online_engine();
    let (switch, calls) = recording_switch();
    let id = engine
        .add_switch(EntitySpec::new("relay", "Relay", "outlet"), switch)
        .unwrap();

    assert_eq!(*calls.borrow(), [false]);
    engine.tick(0);
    engine.tick(10);
    assert_eq!(*calls.borrow(), [false]);
    assert_eq!(engine.is_on(id), Some(false));
    assert_eq!(last_state(&engine), Some(json!({"relay_state": "OFF"})));
}

// ── Tick ──────────────────────────────────────────────────────

#[test]
fn light_commands_coalesce_into_one_batch() {
    let mut engine = online_engine();
    let (_, pwm) = add_led(&mut engine);
    engine.tick(0);
    assert_eq!(
        last_state(&engine),
        Some(json!({"led_state": "OFF", "led_brightness": "255"}))
    );

    let before = engine.transport().published_to(&state_topic()).len();
    engine.transport_mut().inject(&command_topic("led"), "ON");
    engine.transport_mut().inject(&brightness_topic("led"), "128");
    let report = engine.tick(10);

    assert_eq!(report.dispatched, 2);
    assert_eq!(report.published, 2);
    assert_eq!(engine.transport().published_to(&state_topic()).len(), before + 1);
    assert_eq!(
        last_state(&engine),
        Some(json!({"led_state": "ON", "led_brightness": "128"}))
    );
    assert_eq!(pwm.0.get(), 128);
}

#[test]
fn state_payload_matches_wire_format() {
    let mut engine = online_engine();
    add_led(&mut engine);
    engine.transport_mut().inject(&command_topic("led"), "ON");
    engine.transport_mut().inject(&brightness_topic("led"), "128");
    engine.tick(0);

    let topic = state_topic();
    let t = engine.transport();
    assert_eq!(
        t.published_to(&topic).last().copied(),
        Some(r#"{"led_brightness":"128","led_state":"ON"}"#)
    );
}

#[test]
fn command_is_flushed_in_the_same_tick() {
    let mut engine = online_engine();
    let (switch, calls) = recording_switch();
    engine
        .add_switch(EntitySpec::new("relay", "Relay", "outlet"), switch)
        .unwrap();
    engine.tick(0);

    engine.transport_mut().inject(&command_topic("relay"), "ON");
    engine.tick(10);
    assert_eq!(*calls.borrow(), [false, true]);
    assert_eq!(last_state(&engine), Some(json!({"relay_state": "ON"})));
}

#[test]
fn unchanged_value_is_not_republished() {
    let mut engine = online_engine();
    let t = engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    engine.set(t, "state", 21.4f32);
    engine.tick(0);
    let published = engine.transport().published_to(&state_topic()).len();

    assert!(!engine.set(t, "state", 21.4f32));
    let report = engine.tick(10);
    assert_eq!(report.published, 0);
    assert_eq!(engine.transport().published_to(&state_topic()).len(), published);
}

#[test]
fn hub_online_forces_full_resync() {
    let mut engine = online_engine();
    let t = engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    engine.set(t, "state", 21.4f32);
    engine.tick(0);
    assert_eq!(last_state(&engine), Some(json!({"t_state": "21.4"})));

    engine.transport_mut().clear();
    engine.transport_mut().inject("homeassistant/status", "ONLINE");
    let report = engine.tick(10);

    assert_eq!(report.announced, 1);
    assert_eq!(last_state(&engine), Some(json!({"t_state": "21.4"})));
    assert_eq!(
        engine.transport().published_to(&discovery_topic("sensor", "t")).len(),
        1
    );
}

#[test]
fn hub_online_is_case_insensitive() {
    let mut engine = online_engine();
    let t = engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    engine.set(t, "state", 21.4f32);
    engine.tick(0);
    engine.transport_mut().clear();

    engine.transport_mut().inject("homeassistant/status", "online");
    engine.tick(10);
    assert_eq!(last_state(&engine), Some(json!({"t_state": "21.4"})));
}

#[test]
fn hub_offline_does_not_resync() {
    let mut engine = online_engine();
    let t = engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    engine.set(t, "state", 21.4f32);
    engine.tick(0);
    engine.transport_mut().clear();

    engine.transport_mut().inject("homeassistant/status", "offline");
    let report = engine.tick(10);
    assert_eq!(report.dispatched, 1);
    assert!(engine.transport().published.is_empty());
}

// ── Failure handling ──────────────────────────────────────────

#[test]
fn failed_publish_is_retried_next_tick() {
    let mut engine = online_engine();
    let t = engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    engine.set(t, "state", 19.0f32);

    engine.transport_mut().fail_publish = true;
    let report = engine.tick(0);
    assert_eq!(report.published, 0);
    assert_eq!(engine.store().dirty_count(), 1);
    assert_eq!(last_state(&engine), None);

    engine.transport_mut().fail_publish = false;
    let report = engine.tick(10);
    assert_eq!(report.published, 1);
    assert_eq!(engine.store().dirty_count(), 0);
    assert_eq!(last_state(&engine), Some(json!({"t_state": "19.0"})));
}

#[test]
fn unknown_topic_is_dropped() {
    let mut engine = online_engine();
    add_led(&mut engine);
    engine.tick(0);

    engine.transport_mut().inject("some/foreign/topic", "ON");
    let report = engine.tick(10);
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.connection, ConnectionEvent::Online);
}

#[test]
fn invalid_payload_is_ignored() {
    let mut engine = online_engine();
    let (switch, calls) = recording_switch();
    let id = engine
        .add_switch(EntitySpec::new("relay", "Relay", "outlet"), switch)
        .unwrap();
    engine.tick(0);

    engine.transport_mut().inject(&command_topic("relay"), "maybe");
    let report = engine.tick(10);
    assert_eq!(report.dispatched, 0);
    assert_eq!(*calls.borrow(), [false]);
    assert_eq!(engine.get(id, "state"), Some(&ShadowValue::Bool(false)));
}

#[test]
fn lost_session_reconnects_and_resubscribes() {
    let mut engine = online_engine();
    add_led(&mut engine);
    engine.tick(0);

    engine.transport_mut().clear();
    engine.transport_mut().up = false;
    let report = engine.tick(10);

    assert_eq!(report.connection, ConnectionEvent::Established);
    let subscribed = &engine.transport().subscribed;
    assert!(subscribed.contains(&"homeassistant/status".to_string()));
    assert!(subscribed.contains(&command_topic("led")));
    assert!(subscribed.contains(&brightness_topic("led")));
}

#[test]
fn client_side_reconnect_between_ticks_resubscribes() {
    let mut engine = online_engine();
    add_led(&mut engine);
    engine.tick(0);
    assert_eq!(engine.tick(10).connection, ConnectionEvent::Online);

    engine.transport_mut().clear();
    engine.transport_mut().renew_session();
    let report = engine.tick(20);

    assert_eq!(report.connection, ConnectionEvent::Established);
    assert_eq!(engine.transport().connects, 1);
    let subscribed = &engine.transport().subscribed;
    assert!(subscribed.contains(&"homeassistant/status".to_string()));
    assert!(subscribed.contains(&command_topic("led")));
    assert!(subscribed.contains(&brightness_topic("led")));

    assert_eq!(engine.tick(30).connection, ConnectionEvent::Online);
}

#[test]
fn offline_registration_is_announced_once_connected() {
    let mut engine = offline_engine();
    engine.transport_mut().refuse_connects = 2;
    let t = engine
        .add_sensor(EntitySpec::new("t", "Temperature", "temperature"))
        .unwrap();
    engine.set(t, "state", 20.0f32);

    assert_eq!(engine.tick(0).connection, ConnectionEvent::Offline);
    assert_eq!(engine.tick(100).connection, ConnectionEvent::Offline);
    assert_eq!(engine.transport().connects, 1);
    assert_eq!(engine.tick(500).connection, ConnectionEvent::Offline);
    assert!(engine.transport().published.is_empty());

    let report = engine.tick(1000);
    assert_eq!(report.connection, ConnectionEvent::Established);
    assert_eq!(engine.connection_state(), ConnectionState::Connected);
    assert_eq!(report.announced, 1);
    assert_eq!(last_state(&engine), Some(json!({"t_state": "20.0"})));
}

#[test]
fn blocking_connect_retries_until_accepted() {
    let mut engine = offline_engine();
    engine.transport_mut().refuse_connects = 3;
    let mut now = 0u64;
    let clock = std::cell::Cell::new(0u64);
    engine.connect_blocking(
        || clock.get(),
        |ms| {
            now += ms;
            clock.set(now);
        },
    );
    assert_eq!(engine.transport().connects, 4);
    assert_eq!(engine.connection_state(), ConnectionState::Connected);
    assert_eq!(engine.transport().subscribed, ["homeassistant/status"]);
}

#[test]
fn oversized_descriptor_is_refused() {
    let entity = Entity::new(
        EntitySpec::new("led", "External LED", "outlet"),
        EntityKind::Light,
    )
    .unwrap();
    let topics = TopicScheme::new("homeassistant", "nosyna", DEVICE_ID);
    let mut wire = MockTransport::new();
    wire.up = true;
    wire.buffer = 128;

    let res = DiscoveryPublisher::new(identity()).announce(&entity, &topics, &mut wire);
    assert!(matches!(res, Err(TransportError::PayloadTooLarge { limit: 128, .. })));
    assert!(wire.published.is_empty());
}

#[test]
fn log_lines_need_a_session() {
    let mut engine = offline_engine();
    assert_eq!(engine.publish_log("hello"), Err(TransportError::NotConnected));

    let mut engine = online_engine();
    engine.publish_log("hello").unwrap();
    assert_eq!(engine.transport().published_to("logs/nosyna"), ["hello"]);
}
