//! nRFgo motherboard protocol constants and command builders
//!
//! All frames go to bulk endpoint 0x02. Only the ready poll and the reset
//! request are answered.

use nrfdude_core::{Command, HexRecord};

/// Start the target after a reset
pub const CMD_START: u8 = 0x01;
/// Hold the target in reset (reply: 3 bytes)
pub const CMD_RESET: u8 = 0x03;
/// Show a digit on the seven-segment display
pub const CMD_LED: u8 = 0x06;
/// Enter programming mode
pub const CMD_ENTER_PROG: u8 = 0x11;
/// Leave programming mode
pub const CMD_LEAVE_PROG: u8 = 0x12;
/// Erase all target flash
pub const CMD_ERASE: u8 = 0x13;
/// Select the main flash as programming target
pub const CMD_SELECT_FLASH: u8 = 0x15;
/// Poll for completion (reply: 0 when ready)
pub const CMD_READY: u8 = 0x16;
/// Program one HEX record
pub const CMD_WRITE_RECORD: u8 = 0x2C;

/// Reply length of the reset command
pub const RESET_REPLY_LEN: usize = 3;

/// Ready poll reply meaning idle
pub const READY: u8 = 0x00;

/// Polls before giving up on a busy device
pub const READY_POLL_LIMIT: u32 = 100;

/// Highest digit the display can show
pub const MAX_DIGIT: u8 = 9;

/// Enter programming mode
pub fn enter_programming() -> Command {
    Command::send_only([CMD_ENTER_PROG, 0x00])
}

/// Select main flash
pub fn select_main_flash() -> Command {
    Command::send_only([CMD_SELECT_FLASH, 0x00])
}

/// Erase all flash
pub fn erase() -> Command {
    Command::send_only([CMD_ERASE])
}

/// Leave programming mode
pub fn leave_programming() -> Command {
    Command::send_only([CMD_LEAVE_PROG])
}

/// Ready poll
pub fn ready() -> Command {
    Command::new([CMD_READY], 1)
}

/// Display `digit`
pub fn led(digit: u8) -> Command {
    Command::send_only([CMD_LED, digit])
}

/// Put the target into reset
pub fn reset() -> Command {
    Command::new([CMD_RESET], RESET_REPLY_LEN)
}

/// Release the target from reset
pub fn start() -> Command {
    Command::send_only([CMD_START])
}

/// `[0x2C, len, addr_hi, addr_lo, data...]`
pub fn write_record(record: &HexRecord) -> Command {
    let data = record.bytes();
    let [hi, lo] = record.address().to_be_bytes();
    let mut frame = Vec::with_capacity(data.len() + 4);
    frame.extend_from_slice(&[CMD_WRITE_RECORD, data.len() as u8, hi, lo]);
    frame.extend_from_slice(data);
    Command::send_only(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_frame_is_big_endian() {
        let rec = HexRecord::data(0x1234, &[0xDE, 0xAD]).unwrap();
        let cmd = write_record(&rec);
        assert_eq!(cmd.frame(), &[0x2C, 0x02, 0x12, 0x34, 0xDE, 0xAD]);
        assert_eq!(cmd.response_len(), 0);
    }

    #[test]
    fn test_fixed_frames() {
        assert_eq!(enter_programming().frame(), &[0x11, 0x00]);
        assert_eq!(select_main_flash().frame(), &[0x15, 0x00]);
        assert_eq!(erase().frame(), &[0x13]);
        assert_eq!(leave_programming().frame(), &[0x12]);
        assert_eq!(ready().response_len(), 1);
        assert_eq!(reset().response_len(), 3);
        assert_eq!(led(4).frame(), &[0x06, 0x04]);
    }
}
