//! CLI command implementations
//!
//! Every command works on a `dyn FlashProgrammer`, so the same code drives
//! real hardware over USB and the in-memory emulator.

mod list;
mod progress;
mod read;
mod write;

pub use list::list_programmers;
pub use progress::IndicatifProgress;
pub use read::run_read;
pub use write::{load_records, run_write};
