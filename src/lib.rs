//! PegaVox firmware library.
//!
//! Exposes the button pipeline, bus recovery and their ports for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module, with a host
//! simulation fallback alongside.

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod input;
pub mod pins;
pub mod time;

pub mod adapters;
pub mod drivers;
