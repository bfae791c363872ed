//! Flash programming from an Intel HEX file

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nrfdude_core::{read_records, FlashProgrammer, HexRecord, ProgramProgress, SessionConfig};

/// Decode every record of `input`
///
/// This runs before the device is opened, so a bad file never causes any
/// USB traffic.
pub fn load_records(input: &Path) -> Result<Vec<HexRecord>, Box<dyn std::error::Error>> {
    let file = File::open(input).map_err(|e| format!("Cannot open {:?}: {}", input, e))?;
    let records =
        read_records(BufReader::new(file)).map_err(|e| format!("{}: {}", input.display(), e))?;
    log::debug!("Loaded {} records from {:?}", records.len(), input);
    Ok(records)
}

/// Program `records` into the device
pub fn run_write(
    programmer: &mut dyn FlashProgrammer,
    records: &[HexRecord],
    config: &SessionConfig,
    progress: &mut dyn ProgramProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config.protection.protect_bootloader {
        log::warn!("Bootloader protection disabled");
    }
    log::info!("Programming {}...", programmer.variant());
    programmer.program(records, config, progress)?;
    Ok(())
}
