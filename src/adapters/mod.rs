//! Adapters: concrete implementations of the port traits and platform glue.
//!
//! | Adapter     | Implements                 | Connects to               |
//! |-------------|----------------------------|---------------------------|
//! | `device_id` | -                          | eFuse factory MAC         |
//! | `hardware`  | InputPin / OutputPin       | ESP32 GPIO                |
//! |             | SetDutyCycle               | ESP32 LEDC                |
//! | `log_sink`  | log::Log                   | Serial log + broker mirror|
//! | `mqtt`      | TransportPort              | MQTT broker               |
//! | `nvs`       | ConfigPort, StoragePort    | NVS / in-memory store     |
//! | `time`      | -                          | ESP32 system timer        |
//! | `wifi`      | -                          | ESP-IDF WiFi STA          |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
