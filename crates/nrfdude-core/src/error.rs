//! Error types for nrfdude-core
//!
//! Errors are split by the layer that raises them. [`TransportError`] comes
//! from the USB command channel, [`HexError`] from the Intel HEX codec and
//! [`PolicyError`] from address validation in the write planner. [`Error`]
//! wraps all three together with the device-side failures a programmer can
//! report. None of them is retried: any error aborts the whole operation.

use std::fmt;

use thiserror::Error;

use crate::ihex::RecordType;

/// Failures of the USB command channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No device with the requested VID/PID is attached
    #[error("device {vid:04X}:{pid:04X} not found")]
    DeviceNotFound {
        /// USB vendor ID
        vid: u16,
        /// USB product ID
        pid: u16,
    },

    /// The device was found but could not be opened
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// Port reset or re-enumeration failed
    #[error("failed to reset device: {0}")]
    ResetFailed(String),

    /// Setting the configuration or claiming the interface failed
    #[error("failed to set configuration and claim interface: {0}")]
    ClaimFailed(String),

    /// The outbound transfer did not complete fully within the timeout
    #[error("bulk write to endpoint 0x{endpoint:02X} failed: {reason}")]
    WriteFailed {
        /// Endpoint address
        endpoint: u8,
        /// Underlying cause
        reason: String,
    },

    /// The inbound transfer did not complete fully within the timeout
    #[error("bulk read from endpoint 0x{endpoint:02X} failed: {reason}")]
    ReadFailed {
        /// Endpoint address
        endpoint: u8,
        /// Underlying cause
        reason: String,
    },
}

/// Why a HEX line failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Line does not start with ':'
    MissingStartCode,
    /// Odd number of hex digits after the start code
    OddLength,
    /// Non-hex character in the record
    InvalidHexDigit,
    /// Record shorter than the fixed header and checksum
    TooShort,
    /// Byte count field disagrees with the line length
    LengthMismatch {
        /// Bytes announced by the count field
        declared: usize,
        /// Data bytes actually present
        actual: usize,
    },
    /// Record type field is not a known Intel HEX type
    UnknownType(u8),
    /// Checksum byte does not match the record contents
    Checksum {
        /// Checksum computed from the record
        expected: u8,
        /// Checksum found on the line
        found: u8,
    },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStartCode => write!(f, "missing ':' start code"),
            Self::OddLength => write!(f, "odd number of hex digits"),
            Self::InvalidHexDigit => write!(f, "invalid hex digit"),
            Self::TooShort => write!(f, "record too short"),
            Self::LengthMismatch { declared, actual } => write!(
                f,
                "byte count {} does not match {} data bytes",
                declared, actual
            ),
            Self::UnknownType(t) => write!(f, "unknown record type 0x{:02X}", t),
            Self::Checksum { expected, found } => write!(
                f,
                "checksum mismatch: expected 0x{:02X}, found 0x{:02X}",
                expected, found
            ),
        }
    }
}

/// Intel HEX codec errors
#[derive(Debug, Error)]
pub enum HexError {
    /// A line could not be decoded
    #[error("malformed HEX record on line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: MalformedReason,
    },

    /// Segment or linear addressing records are not supported
    #[error("line {line}: {kind:?} records (segment/linear addressing) are not supported")]
    UnsupportedAddressing {
        /// 1-based line number
        line: usize,
        /// Offending record type
        kind: RecordType,
    },

    /// A record can carry at most 255 data bytes
    #[error("HEX record data too long: {0} bytes (max 255)")]
    RecordTooLong(usize),

    /// Reading the HEX stream failed
    #[error("I/O error reading HEX data: {0}")]
    Io(#[from] std::io::Error),
}

impl HexError {
    /// Returns true if this is a checksum mismatch
    pub fn is_checksum(&self) -> bool {
        matches!(
            self,
            HexError::MalformedRecord {
                reason: MalformedReason::Checksum { .. },
                ..
            }
        )
    }
}

/// Address policy violations found while planning a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A record touches an invalid or protected address
    #[error("HEX record touches invalid or protected address 0x{addr:04X}")]
    ProtectedRange {
        /// The first offending address that was checked
        addr: u32,
    },
}

/// Top-level error for flash operations
#[derive(Debug, Error)]
pub enum Error {
    /// Command channel failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// HEX decoding failure
    #[error(transparent)]
    Hex(#[from] HexError),

    /// Protected address range violation
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Page index outside the device
    #[error("invalid page {0}")]
    InvalidPage(u32),

    /// Device returned a non-zero status to the page select/erase command
    #[error("device rejected page {page} (status 0x{code:02X})")]
    DeviceRejectedPage {
        /// Page that was selected
        page: u32,
        /// Status byte returned
        code: u8,
    },

    /// Device returned a non-zero status to a block write
    #[error("device rejected block {block} of page {page} (status 0x{code:02X})")]
    DeviceRejectedBlock {
        /// Page being written
        page: u32,
        /// Absolute block index
        block: u32,
        /// Status byte returned
        code: u8,
    },

    /// Read-back after writing did not match the planned image
    #[error("verify failed at block {block}")]
    VerifyFailed {
        /// Absolute block index
        block: u32,
    },

    /// The device never reported ready within the poll bound
    #[error("device not ready after {attempts} polls")]
    ReadyTimeout {
        /// Number of polls issued
        attempts: u32,
    },

    /// Access outside the flash image
    #[error("address range 0x{addr:04X}+{len} is outside the flash image")]
    AddressOutOfBounds {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: usize,
    },

    /// The selected device does not support this operation
    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),

    /// File I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
