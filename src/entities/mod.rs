//! Entity facades: typed wrappers the firmware registers with the engine.
//!
//! | Facade          | Kind   | Commands                      | Properties            |
//! |-----------------|--------|-------------------------------|-----------------------|
//! | `ClimateSensor` | Sensor | -                             | `state` (×2 entities) |
//! | `Switch`        | Switch | `SetState`, `Toggle`          | `state`               |
//! | `Light`         | Light  | `SetState`, `SetBrightness`, `Toggle` | `state`, `brightness` |
//!
//! Switches and lights are [`EntityHandler`](crate::engine::EntityHandler)s
//! owned by the engine arena.  The climate sensor has no command path and
//! is driven from the main loop instead.

pub mod light;
pub mod sensor;
pub mod switch;

pub use light::Light;
pub use sensor::ClimateSensor;
pub use switch::Switch;
