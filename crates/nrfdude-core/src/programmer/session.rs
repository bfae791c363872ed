//! Per-invocation session configuration

use core::fmt;

use crate::geometry::{FlashGeometry, ProtectionPolicy};

/// Nordic Semiconductor USB vendor ID
pub const NORDIC_VID: u16 = 0x1915;

/// USB identity and endpoints of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbTarget {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Bulk OUT endpoint address
    pub out_endpoint: u8,
    /// Bulk IN endpoint address
    pub in_endpoint: u8,
}

/// Supported device personalities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceVariant {
    /// nRF24LU1+ USB bootloader (block and page commands, read-back)
    Nrf24lu,
    /// nRFgo motherboard programming an nRF8200 (HEX record streaming)
    Nrfgo,
}

impl DeviceVariant {
    /// USB identity this variant enumerates with
    pub const fn usb_target(self) -> UsbTarget {
        match self {
            Self::Nrf24lu => UsbTarget {
                vendor_id: NORDIC_VID,
                product_id: 0x0101,
                out_endpoint: 0x01,
                in_endpoint: 0x81,
            },
            Self::Nrfgo => UsbTarget {
                vendor_id: NORDIC_VID,
                product_id: 0x001A,
                out_endpoint: 0x02,
                in_endpoint: 0x81,
            },
        }
    }

    /// Flash layout of the target device
    pub const fn geometry(self) -> FlashGeometry {
        FlashGeometry::NRF24LU1P
    }

    /// Human-readable device name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nrf24lu => "nRF24LU1+ bootloader",
            Self::Nrfgo => "nRFgo motherboard",
        }
    }
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Firmware version reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
}

impl DeviceVersion {
    /// Decode a 2-byte version reply
    pub fn from_reply(reply: &[u8]) -> Option<Self> {
        match reply {
            [major, minor] => Some(Self {
                major: *major,
                minor: *minor,
            }),
            _ => None,
        }
    }

    /// Format an optional version, `?.?` when unknown
    pub fn display(version: Option<Self>) -> String {
        version.map_or_else(|| "?.?".to_string(), |v| v.to_string())
    }
}

impl fmt::Display for DeviceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What to do when a device never reports ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyPolicy {
    /// Fail with [`Error::ReadyTimeout`](crate::Error::ReadyTimeout)
    #[default]
    Strict,
    /// Log a warning and continue
    Lenient,
}

/// Settings fixed for the whole invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bootloader write protection
    pub protection: ProtectionPolicy,
    /// Selected device personality
    pub variant: DeviceVariant,
    /// Flash layout
    pub geometry: FlashGeometry,
    /// Ready poll timeout handling
    pub ready_policy: ReadyPolicy,
}

impl SessionConfig {
    /// Default settings for `variant`
    pub fn new(variant: DeviceVariant) -> Self {
        Self {
            protection: ProtectionPolicy::default(),
            variant,
            geometry: variant.geometry(),
            ready_policy: ReadyPolicy::default(),
        }
    }

    /// Set the protection policy
    pub fn with_protection(mut self, protection: ProtectionPolicy) -> Self {
        self.protection = protection;
        self
    }

    /// Set the ready poll policy
    pub fn with_ready_policy(mut self, ready_policy: ReadyPolicy) -> Self {
        self.ready_policy = ready_policy;
        self
    }
}
