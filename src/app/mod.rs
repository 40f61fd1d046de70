//! Application boundary: the types that cross between the sync engine and
//! the outside world.
//!
//! All interaction with the broker, flash and sensors happens through the
//! **port traits** defined in [`ports`], keeping the engine fully testable
//! without real peripherals.

pub mod commands;
pub mod ports;
