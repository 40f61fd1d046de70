//! Nosyna firmware library.
//!
//! Exposes the sync engine, entity facades and adapters for integration
//! testing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; every other target
//! gets a simulation back-end.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod engine;
pub mod entities;
pub mod error;
pub mod pins;
pub mod sensors;
