//! nrfdude-usb - USB transport for nrfdude
//!
//! This crate provides [`UsbChannel`], the
//! [`CommandChannel`](nrfdude_core::CommandChannel) used with real hardware.
//! Frames go out on a bulk OUT endpoint and replies come back on a bulk IN
//! endpoint, each leg bounded by a 2 second timeout.
//!
//! # Example
//!
//! ```no_run
//! use nrfdude_core::{CommandChannel, DeviceVariant};
//! use nrfdude_usb::UsbChannel;
//!
//! let mut channel = UsbChannel::open(DeviceVariant::Nrf24lu.usb_target())?;
//! let version = channel.execute(&[0x01], 2)?;
//! println!("version {}.{}", version[0], version[1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod device;

pub use device::{list_devices, UsbChannel, UsbDeviceInfo};
