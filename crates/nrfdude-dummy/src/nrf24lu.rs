//! nRF24LU1+ bootloader emulator

use std::collections::VecDeque;

use nrfdude_core::{CommandChannel, FlashGeometry, TransportError, BLOCKS_PER_PAGE, BLOCK_SIZE};

const OP_VERSION: u8 = 0x01;
const OP_SELECT_PAGE: u8 = 0x02;
const OP_READ_BLOCK: u8 = 0x03;
const OP_SET_MSB: u8 = 0x06;

const OUT_EP: u8 = 0x01;
const IN_EP: u8 = 0x81;

/// Failures the emulator can be told to produce
#[derive(Debug, Clone, Default)]
pub struct Nrf24luFaults {
    /// Answer the select of this page with a non-zero status
    pub reject_page: Option<u32>,
    /// Answer the write of this absolute block with a non-zero status
    pub reject_block: Option<u32>,
    /// Flip a bit when this absolute block is read after it has been written
    pub corrupt_readback: Option<u32>,
    /// Give no reply to the version command
    pub fail_version: bool,
    /// Fail every read of this absolute block
    pub fail_read: Option<u32>,
    /// Refuse this MSB with a non-zero status and keep the old one
    pub reject_msb: Option<u8>,
}

/// In-memory nRF24LU1+ bootloader
///
/// Speaks the block/page protocol over [`CommandChannel`] and records every
/// frame it receives so tests can check exactly what was sent.
pub struct DummyNrf24lu {
    geometry: FlashGeometry,
    flash: Vec<u8>,
    version: [u8; 2],
    msb: u8,
    /// Page being written and the number of blocks received so far
    writing: Option<(u32, usize)>,
    written: Vec<bool>,
    replies: VecDeque<Vec<u8>>,
    frames: Vec<Vec<u8>>,
    faults: Nrf24luFaults,
}

impl DummyNrf24lu {
    /// Create an emulator with erased flash
    pub fn new() -> Self {
        let geometry = FlashGeometry::NRF24LU1P;
        Self {
            geometry,
            flash: vec![0xFF; geometry.flash_size as usize],
            version: [1, 0],
            msb: 0,
            writing: None,
            written: vec![false; geometry.block_count() as usize],
            replies: VecDeque::new(),
            frames: Vec::new(),
            faults: Nrf24luFaults::default(),
        }
    }

    /// Create an emulator with pre-filled flash
    pub fn with_data(initial_data: &[u8]) -> Self {
        let mut dev = Self::new();
        let len = core::cmp::min(initial_data.len(), dev.flash.len());
        dev.flash[..len].copy_from_slice(&initial_data[..len]);
        dev
    }

    /// Set the version the device reports
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.version = [major, minor];
        self
    }

    /// Inject failures
    pub fn with_faults(mut self, faults: Nrf24luFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Current flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Every frame received, in order
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Pages selected for writing, in order
    pub fn page_selects(&self) -> Vec<u32> {
        self.frames
            .iter()
            .filter(|f| f.len() == 2 && f[0] == OP_SELECT_PAGE)
            .map(|f| f[1] as u32)
            .collect()
    }

    /// Number of frames that erase or program flash
    pub fn write_frame_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.len() == BLOCK_SIZE || (f.len() == 2 && f[0] == OP_SELECT_PAGE))
            .count()
    }

    /// Absolute blocks requested with read-block, in order
    pub fn block_reads(&self) -> Vec<u32> {
        let mut msb = 0u32;
        let mut reads = Vec::new();
        for f in &self.frames {
            match f.as_slice() {
                [OP_SET_MSB, m] => msb = *m as u32,
                [OP_READ_BLOCK, b] => reads.push(msb * 256 + *b as u32),
                _ => {}
            }
        }
        reads
    }

    fn handle_block_write(&mut self, page: u32, index: usize, frame: &[u8]) -> u8 {
        let block = page * BLOCKS_PER_PAGE as u32 + index as u32;
        if self.faults.reject_block == Some(block) {
            self.writing = None;
            return 0x01;
        }
        let start = block as usize * BLOCK_SIZE;
        self.flash[start..start + BLOCK_SIZE].copy_from_slice(frame);
        self.written[block as usize] = true;
        0x00
    }

    fn handle_select_page(&mut self, page: u32) -> u8 {
        if page >= self.geometry.page_count() || self.faults.reject_page == Some(page) {
            return 0x01;
        }
        let start = page as usize * BLOCKS_PER_PAGE * BLOCK_SIZE;
        self.flash[start..start + BLOCKS_PER_PAGE * BLOCK_SIZE].fill(0xFF);
        self.writing = Some((page, 0));
        0x00
    }

    fn handle_read_block(&mut self, low: u8) -> Option<Vec<u8>> {
        let block = self.msb as u32 * 256 + low as u32;
        if block >= self.geometry.block_count() || self.faults.fail_read == Some(block) {
            return None;
        }
        let start = block as usize * BLOCK_SIZE;
        let mut data = self.flash[start..start + BLOCK_SIZE].to_vec();
        if self.faults.corrupt_readback == Some(block) && self.written[block as usize] {
            data[0] ^= 0x01;
        }
        Some(data)
    }
}

impl Default for DummyNrf24lu {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for DummyNrf24lu {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.frames.push(frame.to_vec());
        self.replies.clear();

        if let Some((page, index)) = self.writing {
            if frame.len() == BLOCK_SIZE {
                let code = self.handle_block_write(page, index, frame);
                if code == 0 {
                    self.writing = (index + 1 < BLOCKS_PER_PAGE).then_some((page, index + 1));
                }
                self.replies.push_back(vec![code]);
                return Ok(());
            }
            log::debug!("dummy: page {} write abandoned after {} blocks", page, index);
            self.writing = None;
        }

        match frame {
            [OP_VERSION] => {
                if !self.faults.fail_version {
                    self.replies.push_back(self.version.to_vec());
                }
            }
            [OP_SELECT_PAGE, page] => {
                let code = self.handle_select_page(*page as u32);
                self.replies.push_back(vec![code]);
            }
            [OP_READ_BLOCK, low] => {
                if let Some(data) = self.handle_read_block(*low) {
                    self.replies.push_back(data);
                }
            }
            [OP_SET_MSB, msb] if self.faults.reject_msb == Some(*msb) => {
                self.replies.push_back(vec![0x01]);
            }
            [OP_SET_MSB, msb] => {
                self.msb = *msb;
                self.replies.push_back(vec![0x00]);
            }
            _ => {
                return Err(TransportError::WriteFailed {
                    endpoint: OUT_EP,
                    reason: format!("unexpected frame {:02X?}", frame),
                })
            }
        }
        Ok(())
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        match self.replies.pop_front() {
            Some(reply) if reply.len() == len => Ok(reply),
            Some(reply) => Err(TransportError::ReadFailed {
                endpoint: IN_EP,
                reason: format!("short read: {} of {} bytes", reply.len(), len),
            }),
            None => Err(TransportError::ReadFailed {
                endpoint: IN_EP,
                reason: "timeout".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let mut dev = DummyNrf24lu::new().with_version(2, 7);
        assert_eq!(dev.execute(&[OP_VERSION], 2).unwrap(), vec![2, 7]);
    }

    #[test]
    fn test_page_write_and_read() {
        let mut dev = DummyNrf24lu::new();
        assert_eq!(dev.execute(&[OP_SELECT_PAGE, 1], 1).unwrap(), vec![0]);
        for i in 0..8u8 {
            assert_eq!(dev.execute(&[i; 64], 1).unwrap(), vec![0]);
        }
        assert_eq!(dev.execute(&[OP_SET_MSB, 0], 1).unwrap(), vec![0]);
        assert_eq!(dev.execute(&[OP_READ_BLOCK, 9], 64).unwrap(), vec![1; 64]);
        assert_eq!(dev.page_selects(), vec![1]);
        assert_eq!(dev.write_frame_count(), 9);
    }

    #[test]
    fn test_msb_selects_upper_half() {
        let mut data = vec![0xFF; 0x8000];
        data[300 * 64] = 0xAB;
        let mut dev = DummyNrf24lu::with_data(&data);
        dev.execute(&[OP_SET_MSB, 1], 1).unwrap();
        let block = dev.execute(&[OP_READ_BLOCK, 44], 64).unwrap();
        assert_eq!(block[0], 0xAB);
        assert_eq!(dev.block_reads(), vec![300]);
    }

    #[test]
    fn test_invalid_page_rejected() {
        let mut dev = DummyNrf24lu::new();
        assert_eq!(dev.execute(&[OP_SELECT_PAGE, 64], 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_missing_reply_is_read_failure() {
        let mut dev = DummyNrf24lu::new().with_faults(Nrf24luFaults {
            fail_version: true,
            ..Default::default()
        });
        assert!(matches!(
            dev.execute(&[OP_VERSION], 2),
            Err(TransportError::ReadFailed { endpoint: 0x81, .. })
        ));
    }
}
