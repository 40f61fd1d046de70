//! Entity facade tests: light persistence, button input, climate sampling.

use std::collections::VecDeque;

use serde_json::json;

use nosyna::app::commands::Command;
use nosyna::drivers::button::Button;
use nosyna::engine::entity::EntitySpec;
use nosyna::engine::store::ShadowValue;
use nosyna::entities::{ClimateSensor, Light};

use crate::mock_transport::*;

fn led_spec() -> EntitySpec {
    EntitySpec::new("led", "External LED", "outlet")
}

// ── Light ─────────────────────────────────────────────────────

#[test]
fn light_state_survives_reboot() {
    let prefs = MockPrefs::default();

    let mut engine = online_engine();
    engine
        .add_light(led_spec(), Light::new(MockPwm::default(), prefs.clone(), 4))
        .unwrap();
    engine.transport_mut().inject(&command_topic("led"), "ON");
    engine.transport_mut().inject(&brightness_topic("led"), "77");
    engine.tick(0);

    // Fresh engine and light over the same storage.
    let pwm = MockPwm::default();
    let mut engine = online_engine();
    engine
        .add_light(led_spec(), Light::new(pwm.clone(), prefs, 4))
        .unwrap();
    assert_eq!(pwm.0.get(), 77);

    engine.tick(0);
    assert_eq!(
        last_state(&engine),
        Some(json!({"led_state": "ON", "led_brightness": "77"}))
    );
}

#[test]
fn brightness_payload_is_clamped() {
    let pwm = MockPwm::default();
    let mut engine = online_engine();
    let led = engine
        .add_light(led_spec(), Light::new(pwm.clone(), MockPrefs::default(), 4))
        .unwrap();
    engine.transport_mut().inject(&brightness_topic("led"), "900");
    engine.transport_mut().inject(&command_topic("led"), "ON");
    engine.tick(0);

    assert_eq!(engine.get(led, "brightness"), Some(&ShadowValue::Int(255)));
    assert_eq!(pwm.0.get(), 255);
}

#[test]
fn button_click_toggles_light() {
    let pwm = MockPwm::default();
    let mut engine = online_engine();
    let led = engine
        .add_light(led_spec(), Light::new(pwm.clone(), MockPrefs::default(), 4))
        .unwrap();

    let pin = MockPin::default();
    let mut button = Button::new(pin.clone(), 15);
    let mut clicks = 0;
    let press = |button: &mut Button<MockPin>, at: u64| {
        let mut clicked = false;
        pin.0.set(false);
        clicked |= button.poll(at);
        pin.0.set(true);
        clicked |= button.poll(at + 10);
        clicked |= button.poll(at + 70);
        pin.0.set(false);
        clicked |= button.poll(at + 100);
        clicked |= button.poll(at + 160);
        clicked
    };

    for at in [0, 1000] {
        if press(&mut button, at) {
            clicks += 1;
            engine.execute(led, Command::Toggle).unwrap();
        }
        if at == 0 {
            assert_eq!(pwm.0.get(), 255);
            assert_eq!(engine.is_on(led), Some(true));
        }
    }

    assert_eq!(clicks, 2);
    assert_eq!(pwm.0.get(), 0);
    assert_eq!(engine.is_on(led), Some(false));
}

// ── Climate sensor ────────────────────────────────────────────

fn climate(
    engine: &mut nosyna::engine::Engine<MockTransport>,
    temperature: &[Option<f32>],
    humidity: &[Option<f32>],
) -> ClimateSensor<MockClimate> {
    let port = MockClimate {
        temperature: temperature.iter().copied().collect::<VecDeque<_>>(),
        humidity: humidity.iter().copied().collect::<VecDeque<_>>(),
        reads: 0,
    };
    ClimateSensor::register(
        engine,
        port,
        5,
        EntitySpec::new("temperature", "Temperature", "temperature").with_unit("°C"),
        EntitySpec::new("humidity", "Humidity", "humidity").with_unit("%"),
        1000,
    )
    .unwrap()
}

#[test]
fn climate_respects_sampling_interval() {
    let mut engine = online_engine();
    let mut sensor = climate(&mut engine, &[Some(21.0); 4], &[Some(40.0); 4]);

    assert!(sensor.sample(0, &mut engine));
    assert!(!sensor.sample(500, &mut engine));
    assert!(!sensor.sample(999, &mut engine));
    assert!(sensor.sample(1000, &mut engine));
    assert_eq!(sensor.port_mut().reads, 2);
}

#[test]
fn climate_ignores_small_changes() {
    let mut engine = online_engine();
    let mut sensor = climate(
        &mut engine,
        &[Some(21.4), Some(21.45), Some(21.6)],
        &[Some(45.0), Some(45.05), Some(44.0)],
    );
    let t = sensor.temperature_id();
    let h = sensor.humidity_id();

    sensor.sample(0, &mut engine);
    engine.tick(0);
    assert_eq!(
        last_state(&engine),
        Some(json!({"temperature_state": "21.4", "humidity_state": "45.0"}))
    );

    sensor.sample(1000, &mut engine);
    assert_eq!(engine.tick(1000).published, 0);

    sensor.sample(2000, &mut engine);
    assert_eq!(engine.get(t, "state"), Some(&ShadowValue::float(21.6)));
    assert_eq!(engine.get(h, "state"), Some(&ShadowValue::float(44.0)));
}

#[test]
fn climate_skips_failed_and_nan_reads() {
    let mut engine = online_engine();
    let mut sensor = climate(
        &mut engine,
        &[Some(20.0), None, Some(f32::NAN), Some(25.0)],
        &[Some(50.0), Some(f32::NAN), None, Some(55.0)],
    );
    let t = sensor.temperature_id();
    let h = sensor.humidity_id();

    sensor.sample(0, &mut engine);
    sensor.sample(1000, &mut engine);
    sensor.sample(2000, &mut engine);
    assert_eq!(engine.get(t, "state"), Some(&ShadowValue::float(20.0)));
    assert_eq!(engine.get(h, "state"), Some(&ShadowValue::float(50.0)));

    sensor.sample(3000, &mut engine);
    assert_eq!(engine.get(t, "state"), Some(&ShadowValue::float(25.0)));
    assert_eq!(engine.get(h, "state"), Some(&ShadowValue::float(55.0)));
}

#[test]
fn climate_entities_are_announced_as_sensors() {
    let mut engine = online_engine();
    climate(&mut engine, &[], &[]);

    let t = engine.transport();
    let temp = t.published_to(&discovery_topic("sensor", "temperature"));
    assert_eq!(temp.len(), 1);
    let v: serde_json::Value = serde_json::from_str(temp[0]).unwrap();
    assert_eq!(v["unit_of_measurement"], "°C");
    assert_eq!(v["value_template"], "{{ value_json.temperature_state | is_defined }}");
    assert_eq!(t.published_to(&discovery_topic("sensor", "humidity")).len(), 1);
}
