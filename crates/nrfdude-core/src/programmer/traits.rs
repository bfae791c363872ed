//! Programmer trait definitions

use crate::error::{Error, Result};
use crate::ihex::HexRecord;
use crate::image::FlashImage;
use crate::progress::{ProgramProgress, ProgramStats};

use super::session::{DeviceVariant, DeviceVersion, SessionConfig};

/// A device that can be read and programmed from HEX records
///
/// The two device personalities program flash in very different ways. The
/// nRF24LU1+ bootloader works on blocks and pages and supports read-back,
/// while the nRFgo motherboard takes a stream of HEX records. This trait is
/// the common surface the CLI drives, so it takes `dyn` progress reporters
/// and stays object safe.
pub trait FlashProgrammer {
    /// Which device personality this is
    fn variant(&self) -> DeviceVariant;

    /// Query the firmware version
    ///
    /// Returns `None` when the query fails. Callers treat that as unknown
    /// and carry on.
    fn version(&mut self) -> Option<DeviceVersion>;

    /// Read the whole flash into an image
    fn read_image(&mut self, progress: &mut dyn ProgramProgress) -> Result<FlashImage>;

    /// Program the device so that it holds `records`
    ///
    /// Records must have been decoded in full before calling this, so HEX
    /// errors never interrupt a half-finished write.
    fn program(
        &mut self,
        records: &[HexRecord],
        config: &SessionConfig,
        progress: &mut dyn ProgramProgress,
    ) -> Result<ProgramStats>;

    /// Show a digit on the board display
    fn set_display(&mut self, _digit: u8) -> Result<()> {
        Err(Error::Unsupported("display"))
    }

    /// Reset the target device
    fn reset_target(&mut self) -> Result<()> {
        Err(Error::Unsupported("target reset"))
    }
}

impl<P: FlashProgrammer + ?Sized> FlashProgrammer for Box<P> {
    fn variant(&self) -> DeviceVariant {
        (**self).variant()
    }

    fn version(&mut self) -> Option<DeviceVersion> {
        (**self).version()
    }

    fn read_image(&mut self, progress: &mut dyn ProgramProgress) -> Result<FlashImage> {
        (**self).read_image(progress)
    }

    fn program(
        &mut self,
        records: &[HexRecord],
        config: &SessionConfig,
        progress: &mut dyn ProgramProgress,
    ) -> Result<ProgramStats> {
        (**self).program(records, config, progress)
    }

    fn set_display(&mut self, digit: u8) -> Result<()> {
        (**self).set_display(digit)
    }

    fn reset_target(&mut self) -> Result<()> {
        (**self).reset_target()
    }
}
