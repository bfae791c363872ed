//! Intel HEX codec
//!
//! Only the two record types a 16-bit flash image needs are accepted: Data
//! and End Of File. Segment and linear addressing records are recognized so
//! they can be rejected with a clear error instead of being skipped.
//!
//! Record format, one per line:
//!
//! ```text
//! :LLAAAATT[DD...]CC
//!  |  |   | |     `- checksum: two's complement of the sum of all bytes
//!  |  |   | `------- data bytes
//!  |  |   `--------- record type
//!  |  `------------- 16-bit big-endian address
//!  `---------------- data byte count
//! ```

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use crate::error::{HexError, MalformedReason};
use crate::geometry::{Block, ERASED};
use crate::image::FlashImage;

/// Maximum data bytes in one record
pub const MAX_RECORD_DATA: usize = 255;

/// Bytes per record when dumping flash (two records per block)
pub const DUMP_RECORD_SIZE: usize = 32;

/// Intel HEX record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Data record
    Data = 0x00,
    /// End of file
    EndOfFile = 0x01,
    /// Extended segment address (unsupported)
    ExtendedSegmentAddress = 0x02,
    /// Start segment address (unsupported)
    StartSegmentAddress = 0x03,
    /// Extended linear address (unsupported)
    ExtendedLinearAddress = 0x04,
    /// Start linear address (unsupported)
    StartLinearAddress = 0x05,
}

impl RecordType {
    /// Decode the record type field
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Data),
            0x01 => Some(Self::EndOfFile),
            0x02 => Some(Self::ExtendedSegmentAddress),
            0x03 => Some(Self::StartSegmentAddress),
            0x04 => Some(Self::ExtendedLinearAddress),
            0x05 => Some(Self::StartLinearAddress),
            _ => None,
        }
    }

    /// True for the types this codec can process
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Data | Self::EndOfFile)
    }
}

/// A single Intel HEX record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    kind: RecordType,
    address: u16,
    data: Vec<u8>,
}

impl HexRecord {
    /// Create a record, rejecting data longer than 255 bytes
    pub fn new(kind: RecordType, address: u16, data: Vec<u8>) -> Result<Self, HexError> {
        if data.len() > MAX_RECORD_DATA {
            return Err(HexError::RecordTooLong(data.len()));
        }
        Ok(Self {
            kind,
            address,
            data,
        })
    }

    /// Create a data record
    pub fn data(address: u16, data: &[u8]) -> Result<Self, HexError> {
        Self::new(RecordType::Data, address, data.to_vec())
    }

    /// The End Of File record
    pub fn end_of_file() -> Self {
        Self {
            kind: RecordType::EndOfFile,
            address: 0,
            data: Vec::new(),
        }
    }

    /// Record type
    pub fn kind(&self) -> RecordType {
        self.kind
    }

    /// 16-bit load offset
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Data bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// First byte address touched by this record
    pub fn first_addr(&self) -> u32 {
        self.address as u32
    }

    /// Last byte address touched by this record
    ///
    /// Only meaningful for non-empty records.
    pub fn last_addr(&self) -> u32 {
        self.first_addr() + self.data.len().saturating_sub(1) as u32
    }

    /// Two's complement of the sum of all bytes before the checksum
    pub fn checksum(&self) -> u8 {
        let [hi, lo] = self.address.to_be_bytes();
        let sum = self
            .data
            .iter()
            .fold(
                (self.data.len() as u8)
                    .wrapping_add(hi)
                    .wrapping_add(lo)
                    .wrapping_add(self.kind as u8),
                |acc, &b| acc.wrapping_add(b),
            );
        sum.wrapping_neg()
    }

    /// Render as a text line, without the line terminator
    pub fn encode(&self) -> String {
        let mut line = String::with_capacity(11 + self.data.len() * 2);
        // Writing to a String cannot fail
        let _ = write!(
            line,
            ":{:02X}{:04X}{:02X}",
            self.data.len(),
            self.address,
            self.kind as u8
        );
        for b in &self.data {
            let _ = write!(line, "{:02X}", b);
        }
        let _ = write!(line, "{:02X}", self.checksum());
        line
    }
}

/// Encode one record as a text line
pub fn encode_record(kind: RecordType, address: u16, data: &[u8]) -> Result<String, HexError> {
    Ok(HexRecord::new(kind, address, data.to_vec())?.encode())
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode a single record line (already stripped of its terminator)
///
/// `line_no` is only used for error reporting.
pub fn decode_record(line: &str, line_no: usize) -> Result<HexRecord, HexError> {
    decode_record_bytes(line.as_bytes(), line_no)
}

/// Decode a single record from raw line bytes
///
/// Bytes that are not hex digits, including non-ASCII ones, are reported as
/// [`MalformedReason::InvalidHexDigit`].
pub fn decode_record_bytes(line: &[u8], line_no: usize) -> Result<HexRecord, HexError> {
    let malformed = |reason| HexError::MalformedRecord {
        line: line_no,
        reason,
    };

    let digits = line
        .strip_prefix(b":")
        .ok_or_else(|| malformed(MalformedReason::MissingStartCode))?;

    if digits.len() % 2 != 0 {
        return Err(malformed(MalformedReason::OddLength));
    }

    let raw = digits
        .chunks_exact(2)
        .map(|pair| Some(hex_nibble(pair[0])? << 4 | hex_nibble(pair[1])?))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| malformed(MalformedReason::InvalidHexDigit))?;

    // count + address(2) + type + checksum
    if raw.len() < 5 {
        return Err(malformed(MalformedReason::TooShort));
    }

    let declared = raw[0] as usize;
    let actual = raw.len() - 5;
    if declared != actual {
        return Err(malformed(MalformedReason::LengthMismatch { declared, actual }));
    }

    let (body, checksum) = raw.split_at(raw.len() - 1);
    let expected = body
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg();
    if expected != checksum[0] {
        return Err(malformed(MalformedReason::Checksum {
            expected,
            found: checksum[0],
        }));
    }

    let kind = RecordType::from_u8(raw[3])
        .ok_or_else(|| malformed(MalformedReason::UnknownType(raw[3])))?;
    if !kind.is_supported() {
        return Err(HexError::UnsupportedAddressing {
            line: line_no,
            kind,
        });
    }

    Ok(HexRecord {
        kind,
        address: u16::from_be_bytes([raw[1], raw[2]]),
        data: raw[4..4 + declared].to_vec(),
    })
}

/// Lazy record decoder over a text stream
///
/// Yields records until the End Of File record (which is yielded), the
/// first error (also yielded), or the end of input. It is fused after that.
pub struct HexRecords<R> {
    reader: R,
    line_no: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Iterator for HexRecords<R> {
    type Item = Result<HexRecord, HexError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(HexError::Io(e)));
                }
            }
            self.line_no += 1;

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let result = decode_record_bytes(line, self.line_no);
            match &result {
                Ok(rec) if rec.kind() == RecordType::EndOfFile => self.done = true,
                Ok(_) => {}
                Err(_) => self.done = true,
            }
            return Some(result);
        }
        None
    }
}

/// Decode a HEX text stream lazily
pub fn decode_stream<R: BufRead>(reader: R) -> HexRecords<R> {
    HexRecords {
        reader,
        line_no: 0,
        buf: Vec::new(),
        done: false,
    }
}

/// Decode a whole HEX stream up front
///
/// Any decode error is returned before the caller touches the device.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<HexRecord>, HexError> {
    decode_stream(reader).collect()
}

/// Write a flash image as Intel HEX
///
/// Each 64-byte block becomes two 32-byte data records. Records that are
/// entirely erased (0xFF) are left out, so a missing range in the output
/// means erased flash. The stream ends with an End Of File record.
pub fn write_image<W: Write>(image: &FlashImage, mut out: W) -> io::Result<usize> {
    let mut records = 0;

    for b in 0..image.block_count() {
        let block = Block(b);
        let base = block.address().value();
        let Some(data) = image.block(block) else {
            break;
        };

        for (i, chunk) in data.chunks_exact(DUMP_RECORD_SIZE).enumerate() {
            if chunk.iter().all(|&byte| byte == ERASED) {
                continue;
            }
            let addr = base + (i * DUMP_RECORD_SIZE) as u32;
            let rec = HexRecord {
                kind: RecordType::Data,
                address: addr as u16,
                data: chunk.to_vec(),
            };
            writeln!(out, "{}", rec.encode())?;
            records += 1;
        }
    }

    writeln!(out, "{}", HexRecord::end_of_file().encode())?;
    Ok(records)
}
