//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for the supported devices,
//! with feature-gated inclusion and generated help text.

use nrfdude_core::{DeviceVariant, FlashProgrammer, SessionConfig};

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
    /// Device protocol this programmer speaks
    pub variant: DeviceVariant,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "nrf24lu")]
    programmers.push(ProgrammerInfo {
        name: "nrf24lu",
        aliases: &["1"],
        description: "nRF24LU1+ USB bootloader (VID:1915 PID:0101)",
        variant: DeviceVariant::Nrf24lu,
    });

    #[cfg(feature = "nrfgo")]
    programmers.push(ProgrammerInfo {
        name: "nrfgo",
        aliases: &["2"],
        description: "nRF8200 on the nRFgo motherboard (VID:1915 PID:001A)",
        variant: DeviceVariant::Nrfgo,
    });

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory nRF24LU1+ emulator for testing",
        variant: DeviceVariant::Nrf24lu,
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available devices:\n");

    for p in &programmers {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (alias: {})", p.aliases.join(", "))
        };
        help.push_str(&format!("  {:10} - {}{}\n", p.name, p.description, aliases));
    }

    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Look up a programmer by name or alias
pub fn find_programmer(name: &str) -> Option<ProgrammerInfo> {
    let name = name.to_ascii_lowercase();
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name.as_str()))
}

/// Open the programmer described by `info`
///
/// Real devices are opened over USB and reset before use. The dummy device
/// starts with erased flash on every invocation.
pub fn open_programmer(
    info: &ProgrammerInfo,
    config: &SessionConfig,
) -> Result<Box<dyn FlashProgrammer>, Box<dyn std::error::Error>> {
    match info.name {
        #[cfg(feature = "nrf24lu")]
        "nrf24lu" => {
            log::info!("Opening {}...", config.variant);
            let channel = nrfdude_usb::UsbChannel::open(config.variant.usb_target()).map_err(|e| {
                format!(
                    "Failed to open {}: {}\nMake sure the device is connected and you have permissions.",
                    config.variant, e
                )
            })?;
            Ok(Box::new(nrfdude_nrf24lu::Nrf24lu::new(channel)))
        }

        #[cfg(feature = "nrfgo")]
        "nrfgo" => {
            log::info!("Opening {}...", config.variant);
            let channel = nrfdude_usb::UsbChannel::open(config.variant.usb_target()).map_err(|e| {
                format!(
                    "Failed to open {}: {}\nMake sure the device is connected and you have permissions.",
                    config.variant, e
                )
            })?;
            Ok(Box::new(
                nrfdude_nrfgo::Nrfgo::new(channel).with_ready_policy(config.ready_policy),
            ))
        }

        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Using in-memory emulator");
            Ok(Box::new(nrfdude_nrf24lu::Nrf24lu::new(
                nrfdude_dummy::DummyNrf24lu::new(),
            )))
        }

        _ => Err(unknown_programmer_error(info.name)),
    }
}

/// Error for a device name that is not in the registry
pub fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!(
        "Unknown device: {} (expected one of: {})\n\n",
        name,
        programmer_names_short()
    );
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'nrfdude -l' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_alias() {
        assert_eq!(find_programmer("1").unwrap().name, "nrf24lu");
        assert_eq!(find_programmer("2").unwrap().name, "nrfgo");
        assert_eq!(find_programmer("NRFGO").unwrap().variant, DeviceVariant::Nrfgo);
        assert!(find_programmer("3").is_none());
    }

    #[test]
    fn test_help_lists_everything() {
        let help = programmer_help();
        for p in available_programmers() {
            assert!(help.contains(p.name));
        }
        assert_eq!(programmer_names_short(), "nrf24lu, nrfgo, dummy");
    }

    #[test]
    fn test_unknown_device_error() {
        let msg = unknown_programmer_error("3").to_string();
        assert!(msg.starts_with("Unknown device: 3 (expected one of: nrf24lu, nrfgo, dummy)"));
    }

    #[test]
    fn test_open_dummy() {
        let info = find_programmer("dummy").unwrap();
        let config = SessionConfig::new(info.variant);
        let mut programmer = open_programmer(&info, &config).unwrap();
        assert_eq!(programmer.variant(), DeviceVariant::Nrf24lu);
        assert!(programmer.version().is_some());
    }
}
