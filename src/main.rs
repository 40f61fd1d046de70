//! Nosyna Firmware: Main Entry Point
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  MqttTransport   NvsAdapter      Dht22        GpioInput/Output│
//! │  (Transport)     (Config+Prefs)  (Climate)    PwmChannel      │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ─────────────────       │
//! │                                                               │
//! │  ┌────────────────────────────────────────────────────────┐   │
//! │  │  Engine: connection · router · discovery · shadow      │   │
//! │  │  Entities: Light · Switch · ClimateSensor              │   │
//! │  └────────────────────────────────────────────────────────┘   │
//! │                                                               │
//! │  Main loop: watchdog · tick · button · sample · log mirror    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use embedded_hal::digital::{OutputPin, PinState};
use log::{error, info, warn};

use nosyna::adapters::hardware::{GpioInput, GpioOutput, PwmChannel};
use nosyna::adapters::mqtt::MqttTransport;
use nosyna::adapters::nvs::NvsAdapter;
use nosyna::adapters::time::{SystemClock, sleep_ms};
use nosyna::adapters::{device_id, log_sink, wifi};
use nosyna::app::commands::Command;
use nosyna::app::ports::ConfigPort;
use nosyna::config::DeviceConfig;
use nosyna::drivers::button::Button;
use nosyna::drivers::hw_init;
use nosyna::drivers::watchdog::Watchdog;
use nosyna::engine::Engine;
use nosyna::engine::entity::EntitySpec;
use nosyna::entities::{ClimateSensor, Light, Switch};
use nosyna::pins;
use nosyna::sensors::dht22::Dht22;

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    #[cfg(target_os = "espidf")]
    esp_idf_svc::sys::link_patches();
    log_sink::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Nosyna v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    hw_init::init_peripherals()?;
    let watchdog = Watchdog::new();
    let clock = SystemClock::new();

    // ── 2. Config (NVS override, else compiled defaults) ──────
    let nvs = NvsAdapter::new()?;
    let config = {
        #[allow(unused_mut)]
        let mut config = match nvs.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("NVS config load failed ({}), using defaults", e);
                DeviceConfig::default()
            }
        };
        #[cfg(not(target_os = "espidf"))]
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        config
    };

    // ── 3. Identity ───────────────────────────────────────────
    let mac = device_id::read_mac();
    let identity = device_id::identity(&mac, &config.model, &config.manufacturer);

    // ── 4. Network ────────────────────────────────────────────
    let creds = wifi::StationCredentials::new(&config.wifi_ssid, &config.wifi_password);
    #[cfg(target_os = "espidf")]
    let _station = {
        let peripherals = esp_idf_svc::hal::peripherals::Peripherals::take()?;
        wifi::connect(&creds?, peripherals.modem)?
    };
    #[cfg(not(target_os = "espidf"))]
    let _station = match creds {
        Ok(creds) => Some(wifi::connect(&creds)?),
        Err(e) => {
            info!("WiFi: {}, using host network", e);
            None
        }
    };

    let transport = MqttTransport::new(&config);
    let mut engine = Engine::new(transport, &config, identity);
    engine.connect_blocking(
        || clock.uptime_ms(),
        |ms| {
            watchdog.feed();
            sleep_ms(ms);
        },
    );

    // ── 5. Entities ───────────────────────────────────────────
    let mut climate = ClimateSensor::register(
        &mut engine,
        Dht22::new(pins::DHT_GPIO),
        pins::DHT_GPIO,
        EntitySpec::new("temperature", "Temperature", "temperature").with_unit("°C"),
        EntitySpec::new("humidity", "Humidity", "humidity").with_unit("%"),
        config.climate_interval_ms,
    )?;

    let mut builtin = GpioOutput::new(pins::BUILTIN_LED_GPIO);
    engine.add_switch(
        EntitySpec::new("builtin_led", "Built-in LED", "outlet"),
        Switch::new(move |on: bool| {
            // active LOW
            let _ = builtin.set_state(PinState::from(!on));
        }),
    )?;

    let light = engine.add_light(
        EntitySpec::new("led", "External LED", "outlet"),
        Light::new(PwmChannel::new(pins::LIGHT_LEDC_CHANNEL), nvs.clone(), pins::LIGHT_GPIO),
    )?;

    let mut button = Button::new(GpioInput::new(pins::BUTTON_GPIO), pins::BUTTON_GPIO);

    let device = engine.device();
    info!("Device name: {}", device.device_name);
    info!("Device model: {}", device.model);
    info!("Device id: {}", device.device_id);
    info!("Firmware: {}", device.sw_version);
    info!("System ready. Entering main loop.");

    // ── 6. Main loop ──────────────────────────────────────────
    let tick = u64::from(config.tick_interval_ms);
    loop {
        watchdog.feed();
        let now = clock.uptime_ms();

        engine.tick(now);

        if button.poll(now) {
            info!("Button GPIO {} clicked", button.gpio());
            if let Err(e) = engine.execute(light, Command::Toggle) {
                error!("Toggle failed: {}", e);
            }
        }

        climate.sample(now, &mut engine);

        log_sink::forward(|line| engine.publish_log(line));

        sleep_ms(tick);
    }
}
