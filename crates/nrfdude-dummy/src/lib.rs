//! nrfdude-dummy - In-memory device emulators for testing
//!
//! This crate provides emulators of both device personalities. They
//! implement [`CommandChannel`](nrfdude_core::CommandChannel) so the real
//! programmers can drive them without hardware, and they record every frame
//! they receive.

mod nrf24lu;
mod nrfgo;

pub use nrf24lu::{DummyNrf24lu, Nrf24luFaults};
pub use nrfgo::{BusyMode, DummyNrfgo};
