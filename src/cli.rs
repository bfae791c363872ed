//! CLI argument parsing

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nrfdude")]
#[command(
    author,
    version,
    about = "Flash programmer for the nRF24LU1+ USB bootloader and nRFgo motherboard",
    long_about = None,
    disable_help_flag = true
)]
pub struct Cli {
    /// Print this help and exit with status 1
    #[arg(short = 'h', action = ArgAction::SetTrue)]
    pub help: bool,

    /// Dump device flash to FILE (Intel HEX unless --raw)
    #[arg(short = 'r', value_name = "FILE")]
    pub read: Option<PathBuf>,

    /// Program device flash from the Intel HEX FILE
    #[arg(short = 'w', value_name = "FILE")]
    pub write: Option<PathBuf>,

    /// Allow writing to 0x7800-0x7FFF (bootloader)
    #[arg(short = 'x')]
    pub unprotect: bool,

    /// Device to use: nrf24lu (1), nrfgo (2) or dummy
    #[arg(short = 'd', value_name = "DEVICE", default_value = "nrf24lu")]
    pub device: String,

    /// Show a digit (0-9) on the nRFgo motherboard display
    #[arg(short = 'n', value_name = "DIGIT", allow_negative_numbers = true)]
    pub digit: Option<i32>,

    /// Reset the nRFgo target
    #[arg(short = 'f')]
    pub reset: bool,

    /// Dump as raw binary instead of Intel HEX
    #[arg(long)]
    pub raw: bool,

    /// Keep going when the nRFgo board never reports ready
    #[arg(long)]
    pub lenient_ready: bool,

    /// List known devices and attached hardware, then exit
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_flags() {
        let cli = Cli::try_parse_from([
            "nrfdude", "-d", "2", "-w", "fw.hex", "-r", "dump.hex", "-x", "-n", "5", "-f",
            "--lenient-ready", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.device, "2");
        assert_eq!(cli.write, Some(PathBuf::from("fw.hex")));
        assert_eq!(cli.read, Some(PathBuf::from("dump.hex")));
        assert!(cli.unprotect);
        assert_eq!(cli.digit, Some(5));
        assert!(cli.reset);
        assert!(cli.lenient_ready);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.help);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["nrfdude"]).unwrap();
        assert_eq!(cli.device, "nrf24lu");
        assert!(!cli.unprotect);
        assert!(!cli.raw);
        assert!(cli.read.is_none() && cli.write.is_none());
    }

    #[test]
    fn test_help_is_a_plain_flag() {
        let cli = Cli::try_parse_from(["nrfdude", "-h"]).unwrap();
        assert!(cli.help);
    }

    #[test]
    fn test_negative_digit() {
        let cli = Cli::try_parse_from(["nrfdude", "-n", "-3"]).unwrap();
        assert_eq!(cli.digit, Some(-3));
    }
}
