//! nrfdude-nrfgo - nRFgo motherboard support
//!
//! This crate programs an nRF8200 target through the nRFgo development
//! motherboard. Unlike the nRF24LU1+ bootloader the board takes whole HEX
//! records and offers no read-back, so programming is erase-then-stream
//! with ready polling between the slow steps.
//!
//! The board also exposes a seven-segment display and a target reset, both
//! reachable through [`FlashProgrammer`](nrfdude_core::FlashProgrammer).

mod device;
mod protocol;

pub use device::Nrfgo;
