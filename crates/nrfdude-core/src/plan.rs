//! Diff and write planning
//!
//! Overlays HEX records on a copy of the current device image and marks
//! every block a changing record touches. The device can only erase whole
//! pages, so the plan is consumed page by page: any page with a dirty block
//! is rewritten in full from the planned image.

use crate::error::PolicyError;
use crate::geometry::{Address, Block, DirtyBitmap, Page, ProtectionPolicy};
use crate::ihex::{HexRecord, RecordType};
use crate::image::FlashImage;

/// Result of planning a write
#[derive(Debug, Clone)]
pub struct WritePlan {
    /// Desired flash contents after programming
    pub image: FlashImage,
    /// Blocks that need rewriting
    pub dirty: DirtyBitmap,
    /// Data records that were examined
    pub records_applied: usize,
}

impl WritePlan {
    /// True if the device already holds the target contents
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Pages to rewrite, in ascending order
    pub fn pages(&self) -> impl Iterator<Item = Page> + '_ {
        self.dirty.dirty_pages()
    }

    /// Blocks to verify after writing, in ascending order
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.dirty.dirty_blocks()
    }
}

fn check(current: &FlashImage, addr: u32, policy: ProtectionPolicy) -> Result<(), PolicyError> {
    if current.geometry().address_is_valid(addr, policy) {
        Ok(())
    } else {
        Err(PolicyError::ProtectedRange { addr })
    }
}

/// Compute the writes needed to bring `current` in line with `records`
///
/// Records are applied in order, so a later record overrides an earlier one
/// at the same address. Scanning stops at the End Of File record. Every
/// record is checked against `policy` before anything is returned, so a
/// policy error always precedes device writes.
pub fn compute_plan(
    current: &FlashImage,
    records: &[HexRecord],
    policy: ProtectionPolicy,
) -> Result<WritePlan, PolicyError> {
    let mut image = current.clone();
    let mut dirty = DirtyBitmap::new(current.geometry());
    let mut records_applied = 0;

    for rec in records {
        match rec.kind() {
            RecordType::EndOfFile => break,
            RecordType::Data => {}
            // Rejected by the decoder
            _ => continue,
        }
        records_applied += 1;

        let first = rec.first_addr();
        check(current, first, policy)?;
        if rec.bytes().is_empty() {
            continue;
        }
        let last = rec.last_addr();
        check(current, last, policy)?;

        if image.slice(Address(first), rec.bytes().len()) == Some(rec.bytes()) {
            continue;
        }

        let first_block = Address(first).block().index();
        let last_block = Address(last).block().index();
        for b in first_block..=last_block {
            check(current, Block(b).address().value(), policy)?;
        }

        image
            .write(Address(first), rec.bytes())
            .map_err(|_| PolicyError::ProtectedRange { addr: first })?;
        for b in first_block..=last_block {
            dirty.set(Block(b));
        }
        log::trace!(
            "record 0x{:04X}..=0x{:04X} dirties blocks {}..={}",
            first,
            last,
            first_block,
            last_block
        );
    }

    log::debug!(
        "Plan: {} dirty blocks in {} pages",
        dirty.dirty_block_count(),
        dirty.dirty_page_count()
    );

    Ok(WritePlan {
        image,
        dirty,
        records_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FlashGeometry;

    fn erased() -> FlashImage {
        FlashImage::erased(FlashGeometry::NRF24LU1P)
    }

    #[test]
    fn test_identical_target_is_empty() {
        let current = erased();
        let records = vec![
            HexRecord::data(0x0100, &[0xFF; 16]).unwrap(),
            HexRecord::end_of_file(),
        ];
        let plan = compute_plan(&current, &records, ProtectionPolicy::PROTECTED).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.pages().count(), 0);
        assert_eq!(plan.image, current);
        assert_eq!(plan.records_applied, 1);
    }

    #[test]
    fn test_single_record_dirties_one_block() {
        let records = vec![
            HexRecord::data(0x0000, &[0x42; 32]).unwrap(),
            HexRecord::end_of_file(),
        ];
        let plan = compute_plan(&erased(), &records, ProtectionPolicy::PROTECTED).unwrap();
        assert_eq!(plan.blocks().collect::<Vec<_>>(), vec![Block(0)]);
        assert_eq!(plan.pages().collect::<Vec<_>>(), vec![Page(0)]);

        let mut expected = vec![0x42; 32];
        expected.extend_from_slice(&[0xFF; 32]);
        assert_eq!(plan.image.block(Block(0)).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_record_spanning_blocks_and_pages() {
        // 0x01F0..=0x020F crosses block 7/8 and page 0/1
        let records = vec![HexRecord::data(0x01F0, &[0x00; 32]).unwrap()];
        let plan = compute_plan(&erased(), &records, ProtectionPolicy::PROTECTED).unwrap();
        assert_eq!(plan.blocks().collect::<Vec<_>>(), vec![Block(7), Block(8)]);
        assert_eq!(plan.pages().collect::<Vec<_>>(), vec![Page(0), Page(1)]);
    }

    #[test]
    fn test_protected_range_rejected() {
        let records = vec![HexRecord::data(0x7750, &[0x00; 0x100]).unwrap()];
        let err = compute_plan(&erased(), &records, ProtectionPolicy::PROTECTED).unwrap_err();
        let PolicyError::ProtectedRange { addr } = err;
        assert!(addr >= 0x7800);
    }

    #[test]
    fn test_protected_range_allowed_when_unprotected() {
        let records = vec![HexRecord::data(0x7750, &[0x00; 0x100]).unwrap()];
        let plan = compute_plan(&erased(), &records, ProtectionPolicy::UNPROTECTED).unwrap();
        assert!(plan.dirty.is_set(Block(0x7800 / 64)));
        assert_eq!(plan.image.slice(Address(0x784F), 1).unwrap(), &[0x00]);
    }

    #[test]
    fn test_past_end_of_flash_rejected() {
        let records = vec![HexRecord::data(0x7FF0, &[0x00; 32]).unwrap()];
        let err = compute_plan(&erased(), &records, ProtectionPolicy::UNPROTECTED).unwrap_err();
        assert_eq!(err, PolicyError::ProtectedRange { addr: 0x800F });
    }

    #[test]
    fn test_empty_record_checks_first_addr() {
        let ok = vec![HexRecord::data(0x0100, &[]).unwrap()];
        let plan = compute_plan(&erased(), &ok, ProtectionPolicy::PROTECTED).unwrap();
        assert!(plan.is_empty());

        let bad = vec![HexRecord::data(0x7900, &[]).unwrap()];
        assert_eq!(
            compute_plan(&erased(), &bad, ProtectionPolicy::PROTECTED).unwrap_err(),
            PolicyError::ProtectedRange { addr: 0x7900 }
        );
    }

    #[test]
    fn test_later_record_wins() {
        let records = vec![
            HexRecord::data(0x0010, &[0x01, 0x02]).unwrap(),
            HexRecord::data(0x0011, &[0x03]).unwrap(),
        ];
        let plan = compute_plan(&erased(), &records, ProtectionPolicy::PROTECTED).unwrap();
        assert_eq!(plan.image.slice(Address(0x0010), 2).unwrap(), &[0x01, 0x03]);
        assert_eq!(plan.dirty.dirty_block_count(), 1);
    }

    #[test]
    fn test_records_after_eof_ignored() {
        let records = vec![
            HexRecord::end_of_file(),
            HexRecord::data(0x0000, &[0x00]).unwrap(),
        ];
        let plan = compute_plan(&erased(), &records, ProtectionPolicy::PROTECTED).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.records_applied, 0);
    }
}
