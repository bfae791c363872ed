//! In-memory flash image
//!
//! The device erases a page before every page write, so changing a single
//! byte means rewriting the whole page it lives in. Programming therefore
//! works on a full copy of flash: read everything, overlay the HEX data,
//! then rewrite only the pages that changed.

use crate::error::{Error, Result, TransportError};
use crate::geometry::{Address, Block, FlashGeometry, Page, BLOCK_SIZE, ERASED, PAGE_SIZE};
use crate::ihex::{HexRecord, RecordType};
use crate::progress::ProgramProgress;

/// Full byte image of device flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    geometry: FlashGeometry,
    data: Vec<u8>,
}

impl FlashImage {
    /// An image of erased flash (all 0xFF)
    pub fn erased(geometry: FlashGeometry) -> Self {
        Self {
            geometry,
            data: vec![ERASED; geometry.flash_size as usize],
        }
    }

    /// Build an image from HEX records on top of erased flash
    ///
    /// Ranges not covered by any record stay 0xFF. Scanning stops at the
    /// End Of File record.
    pub fn from_records(geometry: FlashGeometry, records: &[HexRecord]) -> Result<Self> {
        let mut image = Self::erased(geometry);
        for rec in records {
            match rec.kind() {
                RecordType::EndOfFile => break,
                RecordType::Data => image.write(Address(rec.first_addr()), rec.bytes())?,
                _ => return Err(Error::Unsupported("segment or linear HEX records")),
            }
        }
        Ok(image)
    }

    /// Flash layout this image was built for
    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-sized image
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of 64-byte blocks
    pub fn block_count(&self) -> u32 {
        self.geometry.block_count()
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes `[addr, addr + len)`, or `None` if out of range
    pub fn slice(&self, addr: Address, len: usize) -> Option<&[u8]> {
        let start = addr.value() as usize;
        self.data.get(start..start.checked_add(len)?)
    }

    /// Contents of one block
    pub fn block(&self, block: Block) -> Option<&[u8]> {
        self.slice(block.address(), BLOCK_SIZE)
    }

    /// Contents of one page
    pub fn page(&self, page: Page) -> Option<&[u8]> {
        self.slice(page.address(), PAGE_SIZE)
    }

    /// Copy `bytes` into the image at `addr`
    pub fn write(&mut self, addr: Address, bytes: &[u8]) -> Result<()> {
        let start = addr.value() as usize;
        let oob = Error::AddressOutOfBounds {
            addr: addr.value(),
            len: bytes.len(),
        };
        let end = start.checked_add(bytes.len()).ok_or(oob)?;
        match self.data.get_mut(start..end) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(Error::AddressOutOfBounds {
                addr: addr.value(),
                len: bytes.len(),
            }),
        }
    }

    /// Replace one block
    pub fn set_block(&mut self, block: Block, bytes: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.write(block.address(), bytes)
    }
}

/// Something that can read flash one block at a time
///
/// Implemented by programmers whose protocol exposes block reads. Any
/// addressing state the device needs (such as a high address byte) is the
/// implementor's business.
pub trait BlockSource {
    /// Read one 64-byte block
    fn read_block(&mut self, block: Block) -> core::result::Result<[u8; BLOCK_SIZE], TransportError>;
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn read_block(&mut self, block: Block) -> core::result::Result<[u8; BLOCK_SIZE], TransportError> {
        (**self).read_block(block)
    }
}

/// Read the whole device into a new image
///
/// Any transport failure aborts the read and no partial image is returned.
pub fn read_full_image<S, P>(
    source: &mut S,
    geometry: FlashGeometry,
    progress: &mut P,
) -> Result<FlashImage>
where
    S: BlockSource + ?Sized,
    P: ProgramProgress + ?Sized,
{
    let blocks = geometry.block_count();
    let mut image = FlashImage::erased(geometry);

    log::debug!("Reading {} blocks", blocks);
    progress.reading(blocks as usize);

    for b in 0..blocks {
        let block = Block(b);
        let data = source.read_block(block)?;
        image.set_block(block, &data)?;
        progress.read_progress(b as usize + 1);
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    struct PatternSource {
        reads: Vec<u32>,
        fail_at: Option<u32>,
    }

    impl BlockSource for PatternSource {
        fn read_block(
            &mut self,
            block: Block,
        ) -> core::result::Result<[u8; BLOCK_SIZE], TransportError> {
            if self.fail_at == Some(block.index()) {
                return Err(TransportError::ReadFailed {
                    endpoint: 0x81,
                    reason: "timeout".into(),
                });
            }
            self.reads.push(block.index());
            Ok([block.index() as u8; BLOCK_SIZE])
        }
    }

    #[test]
    fn test_erased_image() {
        let image = FlashImage::erased(FlashGeometry::NRF24LU1P);
        assert_eq!(image.len(), 32768);
        assert!(image.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut image = FlashImage::erased(FlashGeometry::NRF24LU1P);
        assert!(image.block(Block(511)).is_some());
        assert!(image.block(Block(512)).is_none());
        assert!(image.page(Page(63)).is_some());
        assert!(image.page(Page(64)).is_none());
        assert!(image.slice(Address(0x7FFF), 2).is_none());
        assert!(matches!(
            image.write(Address(0x7FFF), &[0, 0]),
            Err(Error::AddressOutOfBounds { addr: 0x7FFF, len: 2 })
        ));
        image.write(Address(0x7FFE), &[1, 2]).unwrap();
        assert_eq!(image.slice(Address(0x7FFE), 2).unwrap(), &[1, 2]);
    }

    #[test]
    fn test_from_records_overlays_erased() {
        let records = vec![
            HexRecord::data(0x0040, &[0xAA, 0xBB]).unwrap(),
            HexRecord::end_of_file(),
            HexRecord::data(0x0000, &[0x00]).unwrap(),
        ];
        let image = FlashImage::from_records(FlashGeometry::NRF24LU1P, &records).unwrap();
        assert_eq!(image.slice(Address(0x0040), 3).unwrap(), &[0xAA, 0xBB, 0xFF]);
        // Records after EOF are ignored
        assert_eq!(image.slice(Address(0), 1).unwrap(), &[0xFF]);
    }

    #[test]
    fn test_read_full_image() {
        let mut source = PatternSource {
            reads: Vec::new(),
            fail_at: None,
        };
        let image =
            read_full_image(&mut source, FlashGeometry::NRF24LU1P, &mut NoProgress).unwrap();
        assert_eq!(source.reads.len(), 512);
        assert_eq!(image.block(Block(3)).unwrap(), &[3u8; 64]);
        assert_eq!(image.block(Block(300)).unwrap(), &[(300 % 256) as u8; 64]);
    }

    #[test]
    fn test_read_full_image_aborts_on_error() {
        let mut source = PatternSource {
            reads: Vec::new(),
            fail_at: Some(10),
        };
        let result = read_full_image(&mut source, FlashGeometry::NRF24LU1P, &mut NoProgress);
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::ReadFailed { .. }))
        ));
        assert_eq!(source.reads.len(), 10);
    }
}
