//! DHT22 (AM2302) temperature / humidity sensor.
//!
//! Single-wire protocol on an open-drain GPIO with external pull-up:
//!
//! ```text
//!   host:  ‾‾‾\______(1.1 ms)______/‾‾‾ (release)
//!   dht:                                \_80µs_/‾80µs‾\ 40 × [ \_50µs_/‾26µs or 70µs‾ ]
//! ```
//!
//! Frame: humidity ×10 (16 bit), temperature ×10 (15 bit + sign), checksum.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-banged inside a critical section, at most one bus
//! transaction every [`MIN_READ_INTERVAL_MS`]; reads in between return
//! the cached frame.
//! On host/test: reads from static atomics for injection.

use crate::app::ports::{ClimatePort, SensorError};

/// The sensor refuses to convert more often than this.
pub const MIN_READ_INTERVAL_MS: u64 = 2_000;

/// Plausible ranges from the datasheet.
const TEMP_RANGE_C: core::ops::RangeInclusive<f32> = -40.0..=80.0;
const HUMIDITY_RANGE: core::ops::RangeInclusive<f32> = 0.0..=100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dht22Reading {
    pub temperature_c: f32,
    pub humidity: f32,
}

/// Decode a 5-byte frame, verifying the checksum and ranges.
pub fn decode_frame(frame: &[u8; 5]) -> Result<Dht22Reading, SensorError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::Checksum);
    }

    let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f32 / 10.0;
    let magnitude = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]) as f32 / 10.0;
    let temperature_c = if frame[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    if !TEMP_RANGE_C.contains(&temperature_c) || !HUMIDITY_RANGE.contains(&humidity) {
        return Err(SensorError::OutOfRange);
    }
    Ok(Dht22Reading {
        temperature_c,
        humidity,
    })
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    // 21.5 °C / 45.0 %
    static TEMP_BITS: AtomicU32 = AtomicU32::new(0x41AC_0000);
    static HUMIDITY_BITS: AtomicU32 = AtomicU32::new(0x4234_0000);
    static FAIL: AtomicBool = AtomicBool::new(false);

    pub fn set(temperature_c: f32, humidity: f32) {
        TEMP_BITS.store(temperature_c.to_bits(), Ordering::Relaxed);
        HUMIDITY_BITS.store(humidity.to_bits(), Ordering::Relaxed);
    }

    pub fn set_fail(fail: bool) {
        FAIL.store(fail, Ordering::Relaxed);
    }

    pub fn read() -> Option<(f32, f32)> {
        if FAIL.load(Ordering::Relaxed) {
            return None;
        }
        Some((
            f32::from_bits(TEMP_BITS.load(Ordering::Relaxed)),
            f32::from_bits(HUMIDITY_BITS.load(Ordering::Relaxed)),
        ))
    }
}

/// Inject the next simulated reading (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_reading(temperature_c: f32, humidity: f32) {
    sim::set(temperature_c, humidity);
}

/// Make simulated reads time out (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_fail(fail: bool) {
    sim::set_fail(fail);
}

// ── Driver ────────────────────────────────────────────────────

pub struct Dht22 {
    gpio: i32,
    #[cfg(target_os = "espidf")]
    cache: Option<(u64, Dht22Reading)>,
}

impl Dht22 {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            #[cfg(target_os = "espidf")]
            cache: None,
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn read(&mut self) -> Result<Dht22Reading, SensorError> {
        let (temperature_c, humidity) = sim::read().ok_or(SensorError::Timeout)?;
        if temperature_c.is_nan() || humidity.is_nan() {
            return Err(SensorError::OutOfRange);
        }
        Ok(Dht22Reading {
            temperature_c,
            humidity,
        })
    }

    #[cfg(target_os = "espidf")]
    pub fn read(&mut self) -> Result<Dht22Reading, SensorError> {
        let now_ms = (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u64;
        if let Some((at, reading)) = self.cache {
            if now_ms.saturating_sub(at) < MIN_READ_INTERVAL_MS {
                return Ok(reading);
            }
        }

        let frame = bus::read_frame(self.gpio)?;
        let reading = decode_frame(&frame)?;
        self.cache = Some((now_ms, reading));
        Ok(reading)
    }
}

impl ClimatePort for Dht22 {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.read().map(|r| r.temperature_c)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.read().map(|r| r.humidity)
    }
}

#[cfg(target_os = "espidf")]
mod bus {
    use esp_idf_svc::sys::*;

    use crate::app::ports::SensorError;
    use crate::drivers::hw_init::{gpio_read, gpio_write};

    fn now_us() -> i64 {
        unsafe { esp_timer_get_time() }
    }

    /// Wait while the line sits at `level`; returns how long it stayed.
    fn measure(gpio: i32, level: bool, timeout_us: i64) -> Result<i64, SensorError> {
        let start = now_us();
        while gpio_read(gpio) == level {
            if now_us() - start > timeout_us {
                return Err(SensorError::Timeout);
            }
        }
        Ok(now_us() - start)
    }

    pub fn read_frame(gpio: i32) -> Result<[u8; 5], SensorError> {
        // Start signal.
        gpio_write(gpio, false);
        unsafe { esp_rom_delay_us(1_100) };

        esp_idf_svc::hal::interrupt::free(|| {
            gpio_write(gpio, true);
            unsafe { esp_rom_delay_us(30) };

            // Response: low 80 µs, high 80 µs.
            measure(gpio, true, 100)?;
            measure(gpio, false, 100)?;
            measure(gpio, true, 100)?;

            let mut frame = [0u8; 5];
            for bit in 0..40 {
                measure(gpio, false, 80)?;
                let high = measure(gpio, true, 100)?;
                if high > 40 {
                    frame[bit / 8] |= 0x80 >> (bit % 8);
                }
            }
            Ok(frame)
        })
    }
}
