//! Flash dump

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use nrfdude_core::{write_image, FlashProgrammer, ProgramProgress};

/// Read the whole device flash and store it in `output`
///
/// The dump is Intel HEX unless `raw` is set, in which case exactly
/// `flash_size` bytes are written.
pub fn run_read(
    programmer: &mut dyn FlashProgrammer,
    output: &Path,
    raw: bool,
    progress: &mut dyn ProgramProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Reading flash from {}...", programmer.variant());
    let image = programmer.read_image(progress)?;

    if raw {
        fs::write(output, image.as_bytes())?;
        println!("Wrote {} bytes to {:?}", image.len(), output);
    } else {
        let mut out = BufWriter::new(File::create(output)?);
        let records = write_image(&image, &mut out)?;
        out.flush()?;
        println!("Wrote {} records to {:?}", records, output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrfdude_core::{read_records, FlashGeometry, NoProgress, RecordType};
    use nrfdude_dummy::DummyNrf24lu;
    use nrfdude_nrf24lu::Nrf24lu;
    use nrfdude_nrfgo::Nrfgo;
    use std::io::BufReader;
    use tempfile::tempdir;

    fn dummy_with_code() -> DummyNrf24lu {
        let mut flash = vec![0xFF; FlashGeometry::NRF24LU1P.flash_size as usize];
        flash[0x0000..0x0003].copy_from_slice(&[0x02, 0x00, 0x30]);
        flash[0x4100] = 0x5A;
        DummyNrf24lu::with_data(&flash)
    }

    #[test]
    fn test_hex_dump_lists_only_programmed_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.hex");
        let mut programmer = Nrf24lu::new(dummy_with_code());

        run_read(&mut programmer, &path, false, &mut NoProgress).unwrap();

        let records = read_records(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].address(), 0x0000);
        assert_eq!(&records[0].bytes()[..3], &[0x02, 0x00, 0x30]);
        assert_eq!(records[0].bytes().len(), 32);
        assert_eq!(records[1].address(), 0x4100);
        assert_eq!(records[2].kind(), RecordType::EndOfFile);
    }

    #[test]
    fn test_raw_dump_is_flash_sized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.bin");
        let mut programmer = Nrf24lu::new(dummy_with_code());

        run_read(&mut programmer, &path, true, &mut NoProgress).unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 32768);
        assert_eq!(&data[..3], &[0x02, 0x00, 0x30]);
        assert_eq!(data[0x4100], 0x5A);
        assert_eq!(data[0x7FFF], 0xFF);
    }

    #[test]
    fn test_nrfgo_dump_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.hex");
        let mut programmer = Nrfgo::new(nrfdude_dummy::DummyNrfgo::new());

        assert!(run_read(&mut programmer, &path, false, &mut NoProgress).is_err());
        assert!(!path.exists());
    }
}
