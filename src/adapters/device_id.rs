//! Device identity derived from the ESP32 factory MAC address.
//!
//! The full 6-byte MAC in lowercase hex is the stable suffix of every
//! identifier the node presents:
//! - MQTT client id and discovery `identifiers` (`nosyna-aabbccddeeff`)
//! - Human-readable device name in the hub (`Nosyna (aabbccddeeff)`)

use core::fmt::Write;

use crate::engine::discovery::DeviceIdentity;

/// `nosyna-` + 12 hex digits.
pub type DeviceIdString = heapless::String<32>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// 12 lowercase hex digits, no separators.
pub fn mac_hex(mac: &MacAddress) -> heapless::String<12> {
    let mut s = heapless::String::new();
    for b in mac {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Format: `nosyna-aabbccddeeff`.
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "nosyna-{}", mac_hex(mac));
    id
}

/// Format: `Nosyna (aabbccddeeff)`.
pub fn device_name(mac: &MacAddress) -> heapless::String<32> {
    let mut name = heapless::String::new();
    let _ = write!(name, "Nosyna ({})", mac_hex(mac));
    name
}

/// Identity block for discovery, built from the MAC and the board strings.
pub fn identity(mac: &MacAddress, model: &str, manufacturer: &str) -> DeviceIdentity {
    DeviceIdentity::new(
        device_id(mac).as_str(),
        device_name(mac).as_str(),
        model,
        manufacturer,
    )
}
