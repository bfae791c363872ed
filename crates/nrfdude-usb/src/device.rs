//! nusb-backed command channel
//!
//! Opening follows the sequence both devices expect: find by VID/PID, reset
//! the port, set configuration 1, claim interface 0. A port reset makes the
//! device re-enumerate and invalidates the handle, so the device is looked
//! up and opened a second time afterwards.

use std::thread;
use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, In, Out};
use nusb::{DeviceInfo, Endpoint, Interface, MaybeFuture};
use nrfdude_core::{CommandChannel, TransportError, UsbTarget, DEFAULT_TIMEOUT};

/// How long to wait for the device to come back after a port reset
const REENUMERATE_ATTEMPTS: u32 = 20;
const REENUMERATE_DELAY: Duration = Duration::from_millis(100);

/// A connected device matching a [`UsbTarget`]
#[derive(Debug, Clone)]
pub struct UsbDeviceInfo {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
}

impl std::fmt::Display for UsbDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04X}:{:04X} at bus {} address {}",
            self.vendor_id, self.product_id, self.bus, self.address
        )
    }
}

fn find(target: &UsbTarget) -> Result<Option<DeviceInfo>, TransportError> {
    let mut devices = nusb::list_devices()
        .wait()
        .map_err(|e| TransportError::OpenFailed(e.to_string()))?;
    Ok(devices.find(|d| d.vendor_id() == target.vendor_id && d.product_id() == target.product_id))
}

/// List connected devices matching `target`
pub fn list_devices(target: &UsbTarget) -> Result<Vec<UsbDeviceInfo>, TransportError> {
    let devices = nusb::list_devices()
        .wait()
        .map_err(|e| TransportError::OpenFailed(e.to_string()))?
        .filter(|d| d.vendor_id() == target.vendor_id && d.product_id() == target.product_id)
        .map(|d| UsbDeviceInfo {
            bus: d.busnum(),
            address: d.device_address(),
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
        })
        .collect();

    Ok(devices)
}

/// Command channel over a pair of USB bulk endpoints
///
/// Dropping the channel releases the interface and closes the device.
pub struct UsbChannel {
    target: UsbTarget,
    /// Bulk OUT endpoint for command frames
    out_ep: Endpoint<Bulk, Out>,
    /// Bulk IN endpoint for replies
    in_ep: Endpoint<Bulk, In>,
    /// Claimed interface, released on drop
    _interface: Interface,
    timeout: Duration,
}

impl UsbChannel {
    /// Open, reset and claim the first device matching `target`
    pub fn open(target: UsbTarget) -> Result<Self, TransportError> {
        let not_found = TransportError::DeviceNotFound {
            vid: target.vendor_id,
            pid: target.product_id,
        };
        let device_info = find(&target)?.ok_or(not_found)?;

        log::info!(
            "Opening device {:04X}:{:04X} at bus {} address {}",
            target.vendor_id,
            target.product_id,
            device_info.busnum(),
            device_info.device_address()
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        device
            .reset()
            .wait()
            .map_err(|e| TransportError::ResetFailed(e.to_string()))?;
        drop(device);
        log::debug!("Port reset, waiting for re-enumeration");

        let device = Self::reopen(&target)?;

        device
            .set_configuration(1)
            .wait()
            .map_err(|e| TransportError::ClaimFailed(e.to_string()))?;

        let interface = device
            .claim_interface(0)
            .wait()
            .map_err(|e| TransportError::ClaimFailed(e.to_string()))?;

        let out_ep = interface
            .endpoint::<Bulk, Out>(target.out_endpoint)
            .map_err(|e| TransportError::ClaimFailed(e.to_string()))?;
        let in_ep = interface
            .endpoint::<Bulk, In>(target.in_endpoint)
            .map_err(|e| TransportError::ClaimFailed(e.to_string()))?;

        log::debug!(
            "Claimed interface 0, endpoints OUT 0x{:02X} IN 0x{:02X}",
            target.out_endpoint,
            target.in_endpoint
        );

        Ok(Self {
            target,
            out_ep,
            in_ep,
            _interface: interface,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn reopen(target: &UsbTarget) -> Result<nusb::Device, TransportError> {
        for attempt in 0..REENUMERATE_ATTEMPTS {
            thread::sleep(REENUMERATE_DELAY);
            let Some(info) = find(target)? else {
                continue;
            };
            match info.open().wait() {
                Ok(device) => return Ok(device),
                Err(e) => log::debug!("Reopen attempt {} failed: {}", attempt + 1, e),
            }
        }
        Err(TransportError::ResetFailed(
            "device did not come back after reset".into(),
        ))
    }

    fn drain_all_pending(&mut self) {
        self.out_ep.cancel_all();
        while self.out_ep.pending() > 0 {
            if self.out_ep.wait_next_complete(Duration::from_secs(1)).is_none() {
                break;
            }
        }
        self.in_ep.cancel_all();
        while self.in_ep.pending() > 0 {
            if self.in_ep.wait_next_complete(Duration::from_secs(1)).is_none() {
                break;
            }
        }
    }
}

impl CommandChannel for UsbChannel {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let endpoint = self.target.out_endpoint;
        let mut buf = Buffer::new(frame.len());
        buf.extend_from_slice(frame);
        self.out_ep.submit(buf);

        let Some(completion) = self.out_ep.wait_next_complete(self.timeout) else {
            self.drain_all_pending();
            return Err(TransportError::WriteFailed {
                endpoint,
                reason: "timed out".into(),
            });
        };

        completion
            .status
            .map_err(|e| TransportError::WriteFailed {
                endpoint,
                reason: e.to_string(),
            })?;

        if completion.actual_len != frame.len() {
            return Err(TransportError::WriteFailed {
                endpoint,
                reason: format!("short write: {} of {} bytes", completion.actual_len, frame.len()),
            });
        }

        log::trace!("USB write {} bytes", frame.len());
        Ok(())
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let endpoint = self.target.in_endpoint;
        let max_packet_size = self.in_ep.max_packet_size();
        // Request length must be multiple of max packet size
        let request_len = len.div_ceil(max_packet_size).max(1) * max_packet_size;
        let mut buf = Buffer::new(request_len);
        buf.set_requested_len(request_len);
        self.in_ep.submit(buf);

        let Some(completion) = self.in_ep.wait_next_complete(self.timeout) else {
            self.drain_all_pending();
            return Err(TransportError::ReadFailed {
                endpoint,
                reason: "timed out".into(),
            });
        };

        completion
            .status
            .map_err(|e| TransportError::ReadFailed {
                endpoint,
                reason: e.to_string(),
            })?;

        if completion.actual_len < len {
            return Err(TransportError::ReadFailed {
                endpoint,
                reason: format!("short read: {} of {} bytes", completion.actual_len, len),
            });
        }

        log::trace!("USB read {} bytes", completion.actual_len);
        Ok(completion.buffer[..len].to_vec())
    }
}

impl Drop for UsbChannel {
    fn drop(&mut self) {
        // Pending transfers must be reaped before the interface goes away
        self.drain_all_pending();
        log::debug!(
            "Released device {:04X}:{:04X}",
            self.target.vendor_id,
            self.target.product_id
        );
    }
}
