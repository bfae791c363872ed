//! Writes the nrfdude(1) man page
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;
#[path = "../programmers.rs"]
#[allow(dead_code)]
mod programmers;

const EXIT_STATUS: &str = "\
Exit status:
  0  all requested operations succeeded
  1  invalid arguments, -h, or any device, file or protocol error";

/// Render the page, with the compiled-in device list appended
fn render_manpage() -> std::io::Result<Vec<u8>> {
    let extra = format!("{}\n{}", programmers::programmer_help(), EXIT_STATUS);
    let cmd = cli::Cli::command().after_long_help(extra);

    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    Ok(buffer)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;
    let output_path = output_dir.join("nrfdude.1");
    fs::write(&output_path, render_manpage()?)?;

    println!("Man page generated at: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manpage_lists_devices() {
        let page = String::from_utf8(render_manpage().unwrap()).unwrap();
        assert!(page.contains("nrfdude"));
        for p in programmers::available_programmers() {
            assert!(page.contains(p.name), "missing {}", p.name);
        }
        assert!(page.contains("Exit status"));
    }
}
