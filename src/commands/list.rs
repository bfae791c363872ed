//! List commands implementation

use crate::programmers::{available_programmers, programmer_help};

/// List all supported devices and any matching hardware on the bus
pub fn list_programmers() {
    print!("{}", programmer_help());
    println!();

    println!("Attached hardware:");
    let mut found = 0;
    for p in available_programmers().iter().filter(|p| p.name != "dummy") {
        match nrfdude_usb::list_devices(&p.variant.usb_target()) {
            Ok(devices) => {
                for dev in devices {
                    println!("  {:10} - {}", p.name, dev);
                    found += 1;
                }
            }
            Err(e) => log::warn!("Could not enumerate {} devices: {}", p.variant, e),
        }
    }
    if found == 0 {
        println!("  (none)");
    }
}
