//! nRF24LU1+ bootloader protocol constants and command builders

use nrfdude_core::{Block, Command, Page, BLOCK_SIZE};

/// Bulk IN endpoint replies arrive on
pub const IN_ENDPOINT: u8 = 0x81;

/// Query bootloader version (reply: major, minor)
pub const CMD_VERSION: u8 = 0x01;
/// Select and erase a page for writing (reply: status)
pub const CMD_SELECT_PAGE: u8 = 0x02;
/// Read one block addressed by its low byte (reply: 64 bytes)
pub const CMD_READ_BLOCK: u8 = 0x03;
/// Set the high byte of the block index used by reads (reply: status)
pub const CMD_SET_MSB: u8 = 0x06;

/// Reply length of the version command
pub const VERSION_REPLY_LEN: usize = 2;
/// Reply length of status-only commands
pub const STATUS_REPLY_LEN: usize = 1;

/// Blocks addressable without changing the MSB
pub const BLOCKS_PER_MSB: u32 = 256;

/// Status byte for success
pub const STATUS_OK: u8 = 0x00;

/// Version query
pub fn version() -> Command {
    Command::new([CMD_VERSION], VERSION_REPLY_LEN)
}

/// Select and erase `page`
pub fn select_page(page: Page) -> Command {
    Command::new([CMD_SELECT_PAGE, page.index() as u8], STATUS_REPLY_LEN)
}

/// Read `block`, whose high byte must already be selected
pub fn read_block(block: Block) -> Command {
    Command::new([CMD_READ_BLOCK, block.index() as u8], BLOCK_SIZE)
}

/// Select the 256-block half holding `block`
pub fn set_msb(msb: u8) -> Command {
    Command::new([CMD_SET_MSB, msb], STATUS_REPLY_LEN)
}

/// High address byte for `block`
pub const fn msb_of(block: Block) -> u8 {
    (block.index() / BLOCKS_PER_MSB) as u8
}

/// Raw data frame for one block of the selected page
pub fn write_block(data: &[u8]) -> Command {
    Command::new(data, STATUS_REPLY_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames() {
        assert_eq!(version().frame(), &[0x01]);
        assert_eq!(select_page(Page(63)).frame(), &[0x02, 63]);
        assert_eq!(read_block(Block(300)).frame(), &[0x03, 44]);
        assert_eq!(read_block(Block(300)).response_len(), 64);
        assert_eq!(set_msb(1).frame(), &[0x06, 0x01]);
    }

    #[test]
    fn test_msb_of() {
        assert_eq!(msb_of(Block(0)), 0);
        assert_eq!(msb_of(Block(255)), 0);
        assert_eq!(msb_of(Block(256)), 1);
        assert_eq!(msb_of(Block(511)), 1);
    }
}
