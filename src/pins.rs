//! GPIO / peripheral pin assignments for the Nosyna node (ESP32 DevKit).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Light outputs
// ---------------------------------------------------------------------------

/// External dimmable LED, driven through LEDC channel [`LIGHT_LEDC_CHANNEL`].
pub const LIGHT_GPIO: i32 = 4;
/// On-board LED.  Active LOW: writing 0 turns it on.
pub const BUILTIN_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Momentary push-button to 3V3 with internal pull-down.  HIGH = pressed.
pub const BUTTON_GPIO: i32 = 15;

/// DHT22 single-wire data line (open-drain, external 10 kΩ pull-up).
pub const DHT_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC base frequency for the light (5 kHz, flicker-free).
pub const LIGHT_PWM_FREQ_HZ: u32 = 5_000;
pub const LIGHT_LEDC_CHANNEL: u32 = 0;
