//! Flash geometry and address translation
//!
//! The nRF24LU1+ has 32 KiB of flash divided into 64 pages, each holding 8
//! blocks of 64 bytes. From least to most granular the address types are
//! [`Page`], [`Block`] and [`Address`].
//!
//! Translation to a finer granularity is exact. Translation to a coarser one
//! is a floor operation, so addresses are rounded towards zero.

use core::fmt;

/// Bytes per block (the unit of device reads and writes)
pub const BLOCK_SIZE: usize = 64;

/// Blocks per page (the unit of device erase)
pub const BLOCKS_PER_PAGE: usize = 8;

/// Bytes per page
pub const PAGE_SIZE: usize = BLOCK_SIZE * BLOCKS_PER_PAGE;

/// Value of erased flash
pub const ERASED: u8 = 0xFF;

/// Byte address into flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u32);

/// Block index (address / 64)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Block(pub u32);

/// Page index (block / 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Page(pub u32);

impl Address {
    /// Raw address value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Block containing this address (inexact)
    pub const fn block(self) -> Block {
        Block(self.0 / BLOCK_SIZE as u32)
    }

    /// Page containing this address (inexact)
    pub const fn page(self) -> Page {
        self.block().page()
    }
}

impl Block {
    /// Raw block index
    pub const fn index(self) -> u32 {
        self.0
    }

    /// First byte address of this block
    pub const fn address(self) -> Address {
        Address(self.0 * BLOCK_SIZE as u32)
    }

    /// Page containing this block (inexact)
    pub const fn page(self) -> Page {
        Page(self.0 / BLOCKS_PER_PAGE as u32)
    }

    /// Position of this block within its page (0..8)
    pub const fn offset_in_page(self) -> u32 {
        self.0 % BLOCKS_PER_PAGE as u32
    }
}

impl Page {
    /// Raw page index
    pub const fn index(self) -> u32 {
        self.0
    }

    /// First block of this page
    pub const fn block(self) -> Block {
        Block(self.0 * BLOCKS_PER_PAGE as u32)
    }

    /// First byte address of this page
    pub const fn address(self) -> Address {
        self.block().address()
    }

    /// All blocks in this page
    pub fn blocks(self) -> impl Iterator<Item = Block> {
        let first = self.block().0;
        (first..first + BLOCKS_PER_PAGE as u32).map(Block)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}", self.0)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.0)
    }
}

/// `block * 64`
pub const fn block_to_address(block: Block) -> Address {
    block.address()
}

/// `floor(addr / 64)`
pub const fn address_to_block(addr: Address) -> Block {
    addr.block()
}

/// `page * 8`
pub const fn page_to_block(page: Page) -> Block {
    page.block()
}

/// `floor(block / 8)`
pub const fn block_to_page(block: Block) -> Page {
    block.page()
}

/// `page * 512`
pub const fn page_to_address(page: Page) -> Address {
    page.address()
}

/// `floor(addr / 512)`
pub const fn address_to_page(addr: Address) -> Page {
    addr.page()
}

/// Bootloader write protection
///
/// When enabled, the bootloader area at the top of flash is excluded from
/// the valid address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionPolicy {
    /// Refuse writes to the bootloader area
    pub protect_bootloader: bool,
}

impl ProtectionPolicy {
    /// Bootloader protected (the default)
    pub const PROTECTED: Self = Self {
        protect_bootloader: true,
    };

    /// Whole flash writable
    pub const UNPROTECTED: Self = Self {
        protect_bootloader: false,
    };
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::PROTECTED
    }
}

/// Flash layout of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Total flash size in bytes
    pub flash_size: u32,
    /// Start of the protected bootloader area
    pub bootloader_start: u32,
}

impl FlashGeometry {
    /// nRF24LU1+: 32 KiB, bootloader at 0x7800-0x7FFF
    pub const NRF24LU1P: Self = Self {
        flash_size: 0x8000,
        bootloader_start: 0x7800,
    };

    /// Number of 64-byte blocks
    pub const fn block_count(&self) -> u32 {
        self.flash_size / BLOCK_SIZE as u32
    }

    /// Number of 512-byte pages
    pub const fn page_count(&self) -> u32 {
        self.block_count() / BLOCKS_PER_PAGE as u32
    }

    /// Exclusive upper bound of writable addresses under `policy`
    pub const fn write_limit(&self, policy: ProtectionPolicy) -> u32 {
        if policy.protect_bootloader {
            self.bootloader_start
        } else {
            self.flash_size
        }
    }

    /// Check whether an address may be written under `policy`
    ///
    /// Callers only check the first and last byte of a record and every
    /// block-aligned address it touches, not every byte in between. That is
    /// enough as long as the protected area starts on a block boundary.
    pub const fn address_is_valid(&self, addr: u32, policy: ProtectionPolicy) -> bool {
        addr < self.write_limit(policy)
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self::NRF24LU1P
    }
}

/// One bit per block, set when the block must be rewritten
///
/// Bit `b` lives in byte `b / 8`, so each byte covers exactly one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyBitmap {
    bits: Vec<u8>,
}

impl DirtyBitmap {
    /// Create an all-clean bitmap for `geometry`
    pub fn new(geometry: &FlashGeometry) -> Self {
        Self {
            bits: vec![0; geometry.page_count() as usize],
        }
    }

    /// Number of blocks tracked
    pub fn block_count(&self) -> u32 {
        (self.bits.len() * 8) as u32
    }

    /// Mark a block dirty
    ///
    /// Blocks outside the bitmap are ignored.
    pub fn set(&mut self, block: Block) {
        let b = block.index() as usize;
        if let Some(byte) = self.bits.get_mut(b / 8) {
            *byte |= 1 << (b % 8);
        }
    }

    /// Check whether a block is dirty
    pub fn is_set(&self, block: Block) -> bool {
        let b = block.index() as usize;
        self.bits
            .get(b / 8)
            .is_some_and(|byte| byte & (1 << (b % 8)) != 0)
    }

    /// A page is dirty if any of its blocks is
    pub fn page_is_dirty(&self, page: Page) -> bool {
        self.bits
            .get(page.index() as usize)
            .is_some_and(|&byte| byte != 0)
    }

    /// True if nothing needs writing
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Dirty blocks in ascending order
    pub fn dirty_blocks(&self) -> impl Iterator<Item = Block> + '_ {
        (0..self.block_count())
            .map(Block)
            .filter(move |&b| self.is_set(b))
    }

    /// Dirty pages in ascending order
    pub fn dirty_pages(&self) -> impl Iterator<Item = Page> + '_ {
        (0..self.bits.len() as u32)
            .map(Page)
            .filter(move |&p| self.page_is_dirty(p))
    }

    /// Number of dirty blocks
    pub fn dirty_block_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Number of dirty pages
    pub fn dirty_page_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    /// Raw bitmap bytes, one per page
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_address_round_trip() {
        for b in 0..FlashGeometry::NRF24LU1P.block_count() {
            assert_eq!(address_to_block(block_to_address(Block(b))), Block(b));
        }
    }

    #[test]
    fn test_page_block_round_trip() {
        for p in 0..FlashGeometry::NRF24LU1P.page_count() {
            assert_eq!(block_to_page(page_to_block(Page(p))), Page(p));
        }
    }

    #[test]
    fn test_address_flooring() {
        for addr in 0..0x8000u32 {
            let back = block_to_address(address_to_block(Address(addr)));
            assert!(back.value() <= addr);
            assert!(addr - back.value() < BLOCK_SIZE as u32);
        }
    }

    #[test]
    fn test_composed_translations() {
        assert_eq!(page_to_address(Page(1)), Address(0x200));
        assert_eq!(page_to_address(Page(63)), Address(0x7E00));
        assert_eq!(address_to_page(Address(0x7FFF)), Page(63));
        assert_eq!(address_to_page(Address(0x01FF)), Page(0));
        assert_eq!(Block(13).offset_in_page(), 5);
    }

    #[test]
    fn test_geometry_counts() {
        let g = FlashGeometry::NRF24LU1P;
        assert_eq!(g.block_count(), 512);
        assert_eq!(g.page_count(), 64);
    }

    #[test]
    fn test_address_validity() {
        let g = FlashGeometry::NRF24LU1P;
        assert!(g.address_is_valid(0x77FF, ProtectionPolicy::PROTECTED));
        assert!(!g.address_is_valid(0x7800, ProtectionPolicy::PROTECTED));
        assert!(g.address_is_valid(0x7800, ProtectionPolicy::UNPROTECTED));
        assert!(g.address_is_valid(0x7FFF, ProtectionPolicy::UNPROTECTED));
        assert!(!g.address_is_valid(0x8000, ProtectionPolicy::UNPROTECTED));
    }

    #[test]
    fn test_dirty_bitmap() {
        let mut bm = DirtyBitmap::new(&FlashGeometry::NRF24LU1P);
        assert!(bm.is_empty());
        assert_eq!(bm.block_count(), 512);

        bm.set(Block(0));
        bm.set(Block(9));
        bm.set(Block(15));
        bm.set(Block(9999)); // ignored

        assert!(bm.is_set(Block(0)));
        assert!(!bm.is_set(Block(1)));
        assert_eq!(bm.dirty_block_count(), 3);
        assert_eq!(bm.dirty_page_count(), 2);
        assert_eq!(
            bm.dirty_pages().collect::<Vec<_>>(),
            vec![Page(0), Page(1)]
        );
        assert_eq!(
            bm.dirty_blocks().collect::<Vec<_>>(),
            vec![Block(0), Block(9), Block(15)]
        );
        assert!(bm.page_is_dirty(Page(1)));
        assert!(!bm.page_is_dirty(Page(2)));
        assert_eq!(bm.as_bytes()[1], 0b1000_0010);
    }
}
