//! nRF24LU1+ programmer
//!
//! The bootloader erases a page whenever it is selected for writing, so
//! programming is a read-modify-write of the whole flash: read every block,
//! overlay the HEX records, rewrite the pages that changed, then read the
//! changed blocks back.
//!
//! Block reads only carry the low byte of the block index. The high byte is
//! a separate piece of device state set with [`protocol::CMD_SET_MSB`]. We
//! track what we last set and reissue it whenever a read crosses into the
//! other 256-block half. Page writes may disturb it, so the tracked value is
//! forgotten after every page select.

use nrfdude_core::{
    compute_plan, read_full_image, Block, BlockSource, CommandChannel, DeviceVariant,
    DeviceVersion, Error, FlashGeometry, FlashImage, FlashProgrammer, HexRecord, Page,
    ProgramProgress, ProgramStats, Result, SessionConfig, TransportError, BLOCK_SIZE, PAGE_SIZE,
};

use crate::protocol;

/// nRF24LU1+ bootloader connection
pub struct Nrf24lu<C: CommandChannel> {
    channel: C,
    geometry: FlashGeometry,
    /// High address byte last sent to the device, if still valid
    msb: Option<u8>,
}

impl<C: CommandChannel> Nrf24lu<C> {
    /// Wrap a command channel connected to the bootloader
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            geometry: FlashGeometry::NRF24LU1P,
            msb: None,
        }
    }

    /// Query the bootloader version
    pub fn query_version(&mut self) -> core::result::Result<DeviceVersion, TransportError> {
        let reply = self.channel.run(&protocol::version())?;
        DeviceVersion::from_reply(&reply).ok_or_else(|| TransportError::ReadFailed {
            endpoint: protocol::IN_ENDPOINT,
            reason: format!("unexpected version reply {:02X?}", reply),
        })
    }

    fn ensure_msb(&mut self, block: Block) -> core::result::Result<(), TransportError> {
        let msb = protocol::msb_of(block);
        if self.msb == Some(msb) {
            return Ok(());
        }
        let reply = self.channel.run(&protocol::set_msb(msb))?;
        if reply.first() == Some(&protocol::STATUS_OK) {
            self.msb = Some(msb);
        } else {
            // Not cached, so the next read asks again
            log::warn!("Device refused MSB {} (reply {:02X?})", msb, reply);
            self.msb = None;
        }
        Ok(())
    }

    /// Erase `page` and write 512 bytes into it
    ///
    /// The page is erased as soon as the device accepts the select, so a
    /// failed block write leaves it partially written.
    pub fn write_page(&mut self, page: Page, data: &[u8]) -> Result<()> {
        if page.index() >= self.geometry.page_count() {
            return Err(Error::InvalidPage(page.index()));
        }
        if data.len() != PAGE_SIZE {
            return Err(Error::AddressOutOfBounds {
                addr: page.address().value(),
                len: data.len(),
            });
        }

        log::debug!("Writing {}", page);
        self.msb = None;
        let reply = self.channel.run(&protocol::select_page(page))?;
        let code = reply.first().copied().unwrap_or(0xFF);
        if code != protocol::STATUS_OK {
            return Err(Error::DeviceRejectedPage {
                page: page.index(),
                code,
            });
        }

        for (block, chunk) in page.blocks().zip(data.chunks_exact(BLOCK_SIZE)) {
            let reply = self.channel.run(&protocol::write_block(chunk))?;
            let code = reply.first().copied().unwrap_or(0xFF);
            if code != protocol::STATUS_OK {
                return Err(Error::DeviceRejectedBlock {
                    page: page.index(),
                    block: block.index(),
                    code,
                });
            }
        }
        Ok(())
    }

    /// Read `block` back and compare it with `expected`
    pub fn verify_block(&mut self, block: Block, expected: &[u8]) -> Result<()> {
        let actual = self.read_block(block)?;
        if actual.as_slice() != expected {
            log::error!("Block {} differs after write", block.index());
            return Err(Error::VerifyFailed {
                block: block.index(),
            });
        }
        Ok(())
    }
}

impl<C: CommandChannel> BlockSource for Nrf24lu<C> {
    fn read_block(&mut self, block: Block) -> core::result::Result<[u8; BLOCK_SIZE], TransportError> {
        self.ensure_msb(block)?;
        let reply = self.channel.run(&protocol::read_block(block))?;
        reply
            .as_slice()
            .try_into()
            .map_err(|_| TransportError::ReadFailed {
                endpoint: protocol::IN_ENDPOINT,
                reason: format!("block reply of {} bytes", reply.len()),
            })
    }
}

impl<C: CommandChannel> FlashProgrammer for Nrf24lu<C> {
    fn variant(&self) -> DeviceVariant {
        DeviceVariant::Nrf24lu
    }

    fn version(&mut self) -> Option<DeviceVersion> {
        match self.query_version() {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("Version query failed: {}", e);
                None
            }
        }
    }

    fn read_image(&mut self, progress: &mut dyn ProgramProgress) -> Result<FlashImage> {
        let geometry = self.geometry;
        log::info!("Reading device");
        read_full_image(self, geometry, progress)
    }

    fn program(
        &mut self,
        records: &[HexRecord],
        config: &SessionConfig,
        progress: &mut dyn ProgramProgress,
    ) -> Result<ProgramStats> {
        log::info!("Reading device");
        let current = read_full_image(self, config.geometry, progress)?;
        let plan = compute_plan(&current, records, config.protection)?;

        let mut stats = ProgramStats {
            records_applied: plan.records_applied,
            blocks_changed: plan.dirty.dirty_block_count(),
            ..Default::default()
        };

        if plan.is_empty() {
            log::info!("Device already matches, nothing to write");
            progress.complete(&stats);
            return Ok(stats);
        }

        let pages: Vec<Page> = plan.pages().collect();
        log::info!("Writing {} pages", pages.len());
        progress.writing(pages.len());
        for (i, &page) in pages.iter().enumerate() {
            let data = plan
                .image
                .page(page)
                .ok_or(Error::InvalidPage(page.index()))?;
            self.write_page(page, data)?;
            stats.pages_written += 1;
            stats.flash_modified = true;
            progress.write_progress(i + 1);
        }

        let blocks: Vec<Block> = plan.blocks().collect();
        log::info!("Verifying {} blocks", blocks.len());
        progress.verifying(blocks.len());
        for (i, &block) in blocks.iter().enumerate() {
            let expected = plan.image.block(block).ok_or(Error::AddressOutOfBounds {
                addr: block.address().value(),
                len: BLOCK_SIZE,
            })?;
            self.verify_block(block, expected)?;
            stats.blocks_verified += 1;
            progress.verify_progress(i + 1);
        }

        progress.complete(&stats);
        Ok(stats)
    }
}
