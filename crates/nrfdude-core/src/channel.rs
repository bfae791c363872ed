//! Request/response command channel
//!
//! Both device personalities speak a simple synchronous protocol: a command
//! frame goes out on the OUT endpoint and, for most commands, a reply of
//! known length comes back on the IN endpoint. There is no buffering or
//! pipelining; exactly one command is in flight at a time.

use std::time::Duration;

use crate::error::TransportError;

/// Timeout applied to each leg of a transfer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// A command frame plus the reply length it expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    frame: Vec<u8>,
    response_len: usize,
}

impl Command {
    /// Command expecting a `response_len` byte reply
    pub fn new(frame: impl Into<Vec<u8>>, response_len: usize) -> Self {
        Self {
            frame: frame.into(),
            response_len,
        }
    }

    /// Command with no reply
    pub fn send_only(frame: impl Into<Vec<u8>>) -> Self {
        Self::new(frame, 0)
    }

    /// Opcode and parameters
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Expected reply length, 0 for send-only commands
    pub fn response_len(&self) -> usize {
        self.response_len
    }
}

/// Transport for device command frames
///
/// Implementations must deliver the whole frame or fail, and must return
/// exactly the requested number of bytes or fail. A short transfer is a
/// failure. Nothing is retried.
pub trait CommandChannel {
    /// Send one frame on the OUT endpoint
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `len` bytes from the IN endpoint
    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Send a frame and read a reply of `response_len` bytes
    ///
    /// A zero `response_len` sends only and returns an empty reply.
    fn execute(&mut self, frame: &[u8], response_len: usize) -> Result<Vec<u8>, TransportError> {
        log::trace!("-> {:02X?}", frame);
        self.send(frame)?;
        if response_len == 0 {
            return Ok(Vec::new());
        }
        let reply = self.receive(response_len)?;
        log::trace!("<- {:02X?}", reply);
        Ok(reply)
    }

    /// Execute a prepared [`Command`]
    fn run(&mut self, cmd: &Command) -> Result<Vec<u8>, TransportError> {
        self.execute(cmd.frame(), cmd.response_len())
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for &mut C {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).receive(len)
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).receive(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the last frame back, padded or truncated to the read length
    #[derive(Default)]
    struct Echo {
        last: Vec<u8>,
        sends: usize,
        receives: usize,
    }

    impl CommandChannel for Echo {
        fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
            self.sends += 1;
            self.last = frame.to_vec();
            Ok(())
        }

        fn receive(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
            self.receives += 1;
            let mut reply = self.last.clone();
            reply.resize(len, 0);
            Ok(reply)
        }
    }

    #[test]
    fn test_execute_reads_reply() {
        let mut ch = Echo::default();
        let reply = ch.execute(&[0x03, 0x05], 4).unwrap();
        assert_eq!(reply, vec![0x03, 0x05, 0x00, 0x00]);
        assert_eq!((ch.sends, ch.receives), (1, 1));
    }

    #[test]
    fn test_send_only_skips_read() {
        let mut ch = Echo::default();
        let reply = ch.run(&Command::send_only(vec![0x13])).unwrap();
        assert!(reply.is_empty());
        assert_eq!((ch.sends, ch.receives), (1, 0));
    }

    #[test]
    fn test_boxed_and_borrowed_channels() {
        let mut boxed: Box<dyn CommandChannel> = Box::new(Echo::default());
        assert_eq!(boxed.execute(&[0x01], 1).unwrap(), vec![0x01]);

        let mut echo = Echo::default();
        let mut borrowed = &mut echo;
        borrowed.run(&Command::new([0x16], 1)).unwrap();
        assert_eq!(echo.sends, 1);
    }

    #[test]
    fn test_command_accessors() {
        let cmd = Command::new([0x02, 0x07], 1);
        assert_eq!(cmd.frame(), &[0x02, 0x07]);
        assert_eq!(cmd.response_len(), 1);
    }
}
