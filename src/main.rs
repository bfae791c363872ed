//! nrfdude - Flash programmer for Nordic nRF24LU1+ devices
//!
//! Dumps and programs the flash of an nRF24LU1+ through its USB bootloader,
//! and programs nRF8200 parts through the nRFgo motherboard.
//!
//! # Architecture
//!
//! Each device personality implements `FlashProgrammer` on top of a
//! `CommandChannel`. Real hardware uses the USB channel; the `dummy` device
//! runs the same protocol against an in-memory emulator. The commands in
//! this binary only see `dyn FlashProgrammer`.

mod cli;
mod commands;
mod programmers;

use clap::{CommandFactory, Parser};
use cli::Cli;
use commands::IndicatifProgress;
use nrfdude_core::{DeviceVariant, DeviceVersion, ProtectionPolicy, ReadyPolicy, SessionConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if cli.help {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.list {
        commands::list_programmers();
        return Ok(());
    }

    let info = programmers::find_programmer(&cli.device)
        .ok_or_else(|| programmers::unknown_programmer_error(&cli.device))?;

    let mut config = SessionConfig::new(info.variant);
    if cli.unprotect {
        config = config.with_protection(ProtectionPolicy::UNPROTECTED);
    }
    if cli.lenient_ready {
        config = config.with_ready_policy(ReadyPolicy::Lenient);
    }

    // Decode the whole file before any USB traffic
    let records = match &cli.write {
        Some(path) => Some(commands::load_records(path)?),
        None => None,
    };

    let mut programmer = programmers::open_programmer(&info, &config)?;

    if info.variant == DeviceVariant::Nrf24lu {
        log::info!(
            "{} version {}",
            info.variant,
            DeviceVersion::display(programmer.version())
        );
    }

    if info.variant == DeviceVariant::Nrfgo {
        // Negative digits leave the display alone
        if let Some(digit) = cli.digit.filter(|&d| d >= 0) {
            programmer.set_display(u8::try_from(digit).unwrap_or(u8::MAX))?;
        }
        if cli.reset {
            programmer.reset_target()?;
        }
    } else if cli.digit.is_some() || cli.reset {
        log::warn!("-n and -f only apply to the nRFgo motherboard, ignoring");
    }

    if let Some(output) = &cli.read {
        println!("Dumping device to {:?}", output);
        let mut progress = IndicatifProgress::new();
        commands::run_read(programmer.as_mut(), output, cli.raw, &mut progress)?;
    }

    if let (Some(input), Some(records)) = (&cli.write, &records) {
        println!("Programming device with {:?}", input);
        let mut progress = IndicatifProgress::new();
        commands::run_write(programmer.as_mut(), records, &config, &mut progress)?;
    }

    log::info!("Done");
    Ok(())
}
