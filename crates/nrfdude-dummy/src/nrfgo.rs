//! nRFgo motherboard emulator

use std::collections::VecDeque;

use nrfdude_core::{CommandChannel, FlashGeometry, TransportError};

const OP_START: u8 = 0x01;
const OP_RESET: u8 = 0x03;
const OP_LED: u8 = 0x06;
const OP_ENTER_PROG: u8 = 0x11;
const OP_LEAVE_PROG: u8 = 0x12;
const OP_ERASE: u8 = 0x13;
const OP_SELECT_FLASH: u8 = 0x15;
const OP_READY: u8 = 0x16;
const OP_WRITE_RECORD: u8 = 0x2C;

const OUT_EP: u8 = 0x02;
const IN_EP: u8 = 0x81;

/// How the emulator answers ready polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyMode {
    /// Report ready immediately
    Ready,
    /// Report busy for this many polls after each command, then ready
    BusyFor(u32),
    /// Never report ready
    Stuck,
    /// Fail the transfer for this many polls after each command, then ready
    FailFor(u32),
}

/// In-memory nRFgo motherboard with an attached nRF8200 target
pub struct DummyNrfgo {
    flash: Vec<u8>,
    programming: bool,
    led: Option<u8>,
    resets: usize,
    busy: BusyMode,
    busy_left: u32,
    replies: VecDeque<Vec<u8>>,
    frames: Vec<Vec<u8>>,
}

impl DummyNrfgo {
    /// Create an emulator whose target flash is erased
    pub fn new() -> Self {
        Self {
            flash: vec![0xFF; FlashGeometry::NRF24LU1P.flash_size as usize],
            programming: false,
            led: None,
            resets: 0,
            busy: BusyMode::Ready,
            busy_left: 0,
            replies: VecDeque::new(),
            frames: Vec::new(),
        }
    }

    /// Set how ready polls are answered
    pub fn with_busy(mut self, busy: BusyMode) -> Self {
        self.busy = busy;
        self
    }

    /// Target flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// True while in programming mode
    pub fn is_programming(&self) -> bool {
        self.programming
    }

    /// Digit last shown on the display
    pub fn led(&self) -> Option<u8> {
        self.led
    }

    /// Number of completed target resets
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Every frame received, in order
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Frames other than ready polls, in order
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.frames
            .iter()
            .filter(|f| f.first() != Some(&OP_READY))
            .cloned()
            .collect()
    }

    /// Number of ready polls received
    pub fn ready_polls(&self) -> usize {
        self.frames.len() - self.commands().len()
    }

    fn arm_busy(&mut self) {
        self.busy_left = match self.busy {
            BusyMode::BusyFor(n) | BusyMode::FailFor(n) => n,
            BusyMode::Ready | BusyMode::Stuck => 0,
        };
    }

    fn poll(&mut self) {
        match self.busy {
            BusyMode::Ready => self.replies.push_back(vec![0x00]),
            BusyMode::Stuck => self.replies.push_back(vec![0x01]),
            BusyMode::BusyFor(_) if self.busy_left > 0 => {
                self.busy_left -= 1;
                self.replies.push_back(vec![0x01]);
            }
            // No reply, so the read times out
            BusyMode::FailFor(_) if self.busy_left > 0 => self.busy_left -= 1,
            _ => self.replies.push_back(vec![0x00]),
        }
    }

    fn write_record(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let malformed = || TransportError::WriteFailed {
            endpoint: OUT_EP,
            reason: format!("malformed record frame {:02X?}", frame),
        };
        let [_, len, hi, lo, data @ ..] = frame else {
            return Err(malformed());
        };
        if data.len() != *len as usize {
            return Err(malformed());
        }
        if !self.programming {
            log::warn!("dummy: record written outside programming mode");
            return Ok(());
        }
        let start = u16::from_be_bytes([*hi, *lo]) as usize;
        let dst = self
            .flash
            .get_mut(start..start + data.len())
            .ok_or_else(malformed)?;
        // Program only clears bits
        for (d, s) in dst.iter_mut().zip(data) {
            *d &= *s;
        }
        Ok(())
    }
}

impl Default for DummyNrfgo {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for DummyNrfgo {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.frames.push(frame.to_vec());

        match frame {
            [OP_READY] => {
                self.replies.clear();
                self.poll();
                return Ok(());
            }
            [OP_WRITE_RECORD, ..] => self.write_record(frame)?,
            [OP_ENTER_PROG, 0x00] => self.programming = true,
            [OP_LEAVE_PROG] => self.programming = false,
            [OP_SELECT_FLASH, 0x00] => {}
            [OP_ERASE] => {
                if self.programming {
                    self.flash.fill(0xFF);
                }
            }
            [OP_LED, digit] => self.led = Some(*digit),
            [OP_RESET] => self.replies.push_back(vec![0x00; 3]),
            [OP_START] => self.resets += 1,
            _ => {
                return Err(TransportError::WriteFailed {
                    endpoint: OUT_EP,
                    reason: format!("unexpected frame {:02X?}", frame),
                })
            }
        }
        self.arm_busy();
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
