//! nRFgo motherboard programmer
//!
//! The motherboard programs its target from a stream of HEX records. There
//! is no read-back, so the whole flash is erased and every record is sent
//! as-is. Slow commands are followed by polling until the board reports
//! ready.

use nrfdude_core::{
    Command, CommandChannel, DeviceVariant, DeviceVersion, Error, FlashImage, FlashProgrammer,
    HexRecord, ProgramProgress, ProgramStats, ReadyPolicy, RecordType, Result, SessionConfig,
};

use crate::protocol;

/// nRFgo motherboard connection
pub struct Nrfgo<C: CommandChannel> {
    channel: C,
    ready_policy: ReadyPolicy,
}

impl<C: CommandChannel> Nrfgo<C> {
    /// Wrap a command channel connected to the motherboard
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            ready_policy: ReadyPolicy::default(),
        }
    }

    /// Set how waits treat a board that stays busy
    ///
    /// [`FlashProgrammer::program`] replaces this with the policy of the
    /// session it is given, so every wait reads the same value.
    pub fn with_ready_policy(mut self, ready_policy: ReadyPolicy) -> Self {
        self.ready_policy = ready_policy;
        self
    }

    /// Poll until the board reports ready
    ///
    /// A failed poll counts as busy. After [`protocol::READY_POLL_LIMIT`]
    /// polls the outcome depends on the ready policy.
    pub fn wait_for_ready(&mut self) -> Result<()> {
        let cmd = protocol::ready();
        for attempt in 1..=protocol::READY_POLL_LIMIT {
            match self.channel.run(&cmd) {
                Ok(reply) if reply.first() == Some(&protocol::READY) => {
                    log::trace!("Ready after {} polls", attempt);
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => log::trace!("Ready poll {} failed: {}", attempt, e),
            }
        }

        match self.ready_policy {
            ReadyPolicy::Strict => Err(Error::ReadyTimeout {
                attempts: protocol::READY_POLL_LIMIT,
            }),
            ReadyPolicy::Lenient => {
                log::warn!(
                    "Device not ready after {} polls, continuing",
                    protocol::READY_POLL_LIMIT
                );
                Ok(())
            }
        }
    }

    fn run_and_wait(&mut self, cmd: &Command) -> Result<()> {
        self.channel.run(cmd)?;
        self.wait_for_ready()
    }
}

impl<C: CommandChannel> FlashProgrammer for Nrfgo<C> {
    fn variant(&self) -> DeviceVariant {
        DeviceVariant::Nrfgo
    }

    fn version(&mut self) -> Option<DeviceVersion> {
        None
    }

    fn read_image(&mut self, _progress: &mut dyn ProgramProgress) -> Result<FlashImage> {
        Err(Error::Unsupported("reading flash"))
    }

    fn program(
        &mut self,
        records: &[HexRecord],
        config: &SessionConfig,
        progress: &mut dyn ProgramProgress,
    ) -> Result<ProgramStats> {
        self.ready_policy = config.ready_policy;
        let data: Vec<&HexRecord> = records
            .iter()
            .take_while(|r| r.kind() != RecordType::EndOfFile)
            .filter(|r| r.kind() == RecordType::Data)
            .collect();

        log::info!("Entering programming mode");
        self.run_and_wait(&protocol::enter_programming())?;
        self.run_and_wait(&protocol::select_main_flash())?;
        log::info!("Erasing target");
        self.run_and_wait(&protocol::erase())?;

        let mut stats = ProgramStats {
            flash_modified: true,
            ..Default::default()
        };

        log::info!("Writing {} records", data.len());
        progress.writing(data.len());
        for (i, rec) in data.iter().enumerate() {
            let cmd = protocol::write_record(rec);
            log::debug!("Record 0x{:04X} ({} bytes)", rec.address(), rec.bytes().len());
            self.channel.run(&cmd)?;
            stats.records_applied += 1;
            progress.write_progress(i + 1);
        }
        self.wait_for_ready()?;

        self.channel.run(&protocol::leave_programming())?;
        log::info!("Left programming mode");

        progress.complete(&stats);
        Ok(stats)
    }

    fn set_display(&mut self, digit: u8) -> Result<()> {
        let digit = if digit > protocol::MAX_DIGIT {
            log::warn!("Invalid display digit {}, showing 0", digit);
            0
        } else {
            digit
        };
        log::info!("Setting display to {}", digit);
        self.run_and_wait(&protocol::led(digit))
    }

    fn reset_target(&mut self) -> Result<()> {
        log::info!("Resetting target");
        self.run_and_wait(&protocol::reset())?;
        self.run_and_wait(&protocol::start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrfdude_core::{NoProgress, ProtectionPolicy};
    use nrfdude_dummy::{BusyMode, DummyNrfgo};

    fn config(policy: ReadyPolicy) -> SessionConfig {
        SessionConfig::new(DeviceVariant::Nrfgo).with_ready_policy(policy)
    }

    fn sample() -> Vec<HexRecord> {
        vec![
            HexRecord::data(0x0000, &[0x02, 0x00, 0x30]).unwrap(),
            HexRecord::data(0x0130, &[0xAA; 16]).unwrap(),
            HexRecord::end_of_file(),
            HexRecord::data(0x0200, &[0x00]).unwrap(),
        ]
    }

    #[test]
    fn test_program_sequence() {
        let mut dummy = DummyNrfgo::new();
        let stats = Nrfgo::new(&mut dummy)
            .program(&sample(), &config(ReadyPolicy::Strict), &mut NoProgress)
            .unwrap();
        assert_eq!(stats.records_applied, 2);

        let commands = dummy.commands();
        assert_eq!(commands[0], vec![0x11, 0x00]);
        assert_eq!(commands[1], vec![0x15, 0x00]);
        assert_eq!(commands[2], vec![0x13]);
        assert_eq!(commands[3], vec![0x2C, 3, 0x00, 0x00, 0x02, 0x00, 0x30]);
        assert_eq!(&commands[4][..4], &[0x2C, 16, 0x01, 0x30]);
        assert_eq!(commands[5], vec![0x12]);
        assert_eq!(commands.len(), 6);

        assert!(!dummy.is_programming());
        assert_eq!(&dummy.flash()[..3], &[0x02, 0x00, 0x30]);
        assert_eq!(dummy.flash()[0x200], 0xFF);
    }

    #[test]
    fn test_one_frame_per_record() {
        let records: Vec<HexRecord> = (0..10u16)
            .map(|i| HexRecord::data(i * 0x20, &[i as u8; 0x20]).unwrap())
            .collect();
        let mut dummy = DummyNrfgo::new();
        Nrfgo::new(&mut dummy)
            .program(&records, &config(ReadyPolicy::Strict), &mut NoProgress)
            .unwrap();
        let writes: Vec<_> = dummy
            .commands()
            .into_iter()
            .filter(|f| f[0] == 0x2C)
            .collect();
        assert_eq!(writes.len(), 10);
        assert_eq!(&writes[9][..4], &[0x2C, 0x20, 0x01, 0x20]);
    }

    #[test]
    fn test_no_address_policy() {
        let mut dummy = DummyNrfgo::new();
        let records = vec![HexRecord::data(0x7800, &[0x00]).unwrap()];
        let cfg = config(ReadyPolicy::Strict).with_protection(ProtectionPolicy::PROTECTED);
        Nrfgo::new(&mut dummy)
            .program(&records, &cfg, &mut NoProgress)
            .unwrap();
        assert_eq!(dummy.flash()[0x7800], 0x00);
    }

    #[test]
    fn test_strict_ready_timeout() {
        let mut dummy = DummyNrfgo::new().with_busy(BusyMode::Stuck);
        let err = Nrfgo::new(&mut dummy)
            .program(&sample(), &config(ReadyPolicy::Strict), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::ReadyTimeout { attempts: 100 }));
        assert_eq!(dummy.ready_polls(), 100);
        // Gave up after entering programming mode
        assert_eq!(dummy.commands(), vec![vec![0x11, 0x00]]);
    }

    #[test]
    fn test_lenient_ready_timeout() {
        let mut dummy = DummyNrfgo::new().with_busy(BusyMode::Stuck);
        let stats = Nrfgo::new(&mut dummy)
            .program(&sample(), &config(ReadyPolicy::Lenient), &mut NoProgress)
            .unwrap();
        assert_eq!(stats.records_applied, 2);
        // Four waits of 100 polls each
        assert_eq!(dummy.ready_polls(), 400);
    }

    #[test]
    fn test_failed_polls_count_as_busy() {
        let mut dummy = DummyNrfgo::new().with_busy(BusyMode::FailFor(5));
        let mut dev = Nrfgo::new(&mut dummy);
        dev.run_and_wait(&protocol::erase()).unwrap();
        drop(dev);
        assert_eq!(dummy.ready_polls(), 6);

        let mut dummy = DummyNrfgo::new().with_busy(BusyMode::BusyFor(3));
        let mut dev = Nrfgo::new(&mut dummy);
        dev.run_and_wait(&protocol::erase()).unwrap();
        drop(dev);
        assert_eq!(dummy.ready_polls(), 4);
    }

    #[test]
    fn test_session_policy_governs_later_waits() {
        let mut dummy = DummyNrfgo::new().with_busy(BusyMode::Stuck);
        let mut dev = Nrfgo::new(&mut dummy).with_ready_policy(ReadyPolicy::Lenient);
        dev.set_display(3).unwrap();

        let err = dev
            .program(&sample(), &config(ReadyPolicy::Strict), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::ReadyTimeout { .. }));
        // The strict session policy now applies outside program too
        assert!(matches!(
            dev.reset_target(),
            Err(Error::ReadyTimeout { attempts: 100 })
        ));
    }

    #[test]
    fn test_display_digit_clamped() {
        let mut dummy = DummyNrfgo::new();
        let mut dev = Nrfgo::new(&mut dummy);
        dev.set_display(7).unwrap();
        dev.set_display(12).unwrap();
        drop(dev);
        assert_eq!(dummy.commands(), vec![vec![0x06, 7], vec![0x06, 0]]);
        assert_eq!(dummy.led(), Some(0));
    }

    #[test]
    fn test_reset_target() {
        let mut dummy = DummyNrfgo::new();
        Nrfgo::new(&mut dummy).reset_target().unwrap();
        assert_eq!(dummy.commands(), vec![vec![0x03], vec![0x01]]);
        assert_eq!(dummy.ready_polls(), 2);
        assert_eq!(dummy.resets(), 1);
    }

    #[test]
    fn test_read_unsupported() {
        let mut dummy = DummyNrfgo::new();
        let err = Nrfgo::new(&mut dummy)
            .read_image(&mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(dummy.frames().is_empty());
    }
}
