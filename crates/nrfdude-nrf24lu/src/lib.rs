//! nrfdude-nrf24lu - nRF24LU1+ USB bootloader support
//!
//! This crate drives the bootloader that ships in the top 2 KiB of the
//! nRF24LU1+ flash.
//!
//! # Protocol Overview
//!
//! Every command is a short frame on bulk endpoint 0x01 answered on 0x81.
//! Flash is read in 64-byte blocks and written in 512-byte pages; selecting
//! a page for writing erases it, after which the host sends the page as
//! eight raw 64-byte frames, each acknowledged with a status byte.
//!
//! # Example
//!
//! ```ignore
//! use nrfdude_core::{DeviceVariant, DeviceVersion, FlashProgrammer, NoProgress};
//! use nrfdude_nrf24lu::Nrf24lu;
//! use nrfdude_usb::UsbChannel;
//!
//! let channel = UsbChannel::open(DeviceVariant::Nrf24lu.usb_target())?;
//! let mut dev = Nrf24lu::new(channel);
//! println!("version {}", DeviceVersion::display(dev.version()));
//! let image = dev.read_image(&mut NoProgress)?;
//! ```

mod device;
mod protocol;

pub use device::Nrf24lu;
