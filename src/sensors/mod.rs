//! Sensor drivers behind [`ClimatePort`](crate::app::ports::ClimatePort).

pub mod dht22;
