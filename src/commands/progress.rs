//! Terminal progress reporting

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nrfdude_core::{ProgramProgress, ProgramStats};

fn create_progress_bar_with_phase(
    total: u64,
    unit: &str,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}}) {}",
                unit, phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
        }
    }

    fn create_bar(&mut self, total: usize, unit: &str, phase: &str) {
        self.finish_current();
        let total = total as u64;
        let pb = self.multi.add(
            create_progress_bar_with_phase(total, unit, phase)
                .unwrap_or_else(|_| ProgressBar::new(total)),
        );
        self.current_bar = Some(pb);
    }

    fn set_position(&self, pos: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(pos as u64);
        }
    }

    fn finish_current(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish();
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramProgress for IndicatifProgress {
    fn reading(&mut self, total_blocks: usize) {
        self.create_bar(total_blocks, "blocks", "Reading");
    }

    fn read_progress(&mut self, blocks_read: usize) {
        self.set_position(blocks_read);
    }

    fn writing(&mut self, total_units: usize) {
        self.create_bar(total_units, "", "Writing");
    }

    fn write_progress(&mut self, units_written: usize) {
        self.set_position(units_written);
    }

    fn verifying(&mut self, total_blocks: usize) {
        self.create_bar(total_blocks, "blocks", "Verifying");
    }

    fn verify_progress(&mut self, blocks_verified: usize) {
        self.set_position(blocks_verified);
    }

    fn complete(&mut self, stats: &ProgramStats) {
        self.finish_current();
        println!("{}", summary(stats));
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // Leave a half-drawn bar visible when an operation fails
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}

/// One-line description of a finished programming run
pub fn summary(stats: &ProgramStats) -> String {
    if !stats.flash_modified {
        return "Flash already contains the desired data - no changes needed".to_string();
    }
    if stats.pages_written == 0 {
        return format!("Programmed {} records", stats.records_applied);
    }
    format!(
        "Programmed {} records: {} blocks changed, {} pages written, {} blocks verified",
        stats.records_applied, stats.blocks_changed, stats.pages_written, stats.blocks_verified
    )
}
