//! Progress reporting and programming statistics

/// Statistics from a programming operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramStats {
    /// Data records taken from the HEX file
    pub records_applied: usize,
    /// Blocks that differed from device contents
    pub blocks_changed: usize,
    /// Page erase/write cycles performed
    pub pages_written: usize,
    /// Blocks read back and compared
    pub blocks_verified: usize,
    /// Whether any flash operation was performed
    pub flash_modified: bool,
}

/// Progress callback for reading, programming and verifying flash
///
/// Counts are in blocks for block-oriented devices and in records for
/// devices that stream HEX records.
pub trait ProgramProgress {
    /// Called when starting to read current flash contents
    fn reading(&mut self, total_blocks: usize);

    /// Called to update read progress
    fn read_progress(&mut self, blocks_read: usize);

    /// Called when starting write operations
    fn writing(&mut self, total_units: usize);

    /// Called to update write progress
    fn write_progress(&mut self, units_written: usize);

    /// Called when starting to verify written blocks
    fn verifying(&mut self, total_blocks: usize);

    /// Called to update verify progress
    fn verify_progress(&mut self, blocks_verified: usize);

    /// Called when the operation is complete
    fn complete(&mut self, stats: &ProgramStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {
    fn reading(&mut self, _total_blocks: usize) {}
    fn read_progress(&mut self, _blocks_read: usize) {}
    fn writing(&mut self, _total_units: usize) {}
    fn write_progress(&mut self, _units_written: usize) {}
    fn verifying(&mut self, _total_blocks: usize) {}
    fn verify_progress(&mut self, _blocks_verified: usize) {}
    fn complete(&mut self, _stats: &ProgramStats) {}
}
