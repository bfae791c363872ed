//! nrfdude-core - Core library for nRF24LU1+ flash synchronization
//!
//! This crate holds everything that does not touch USB: flash geometry and
//! address translation, the Intel HEX codec, the in-memory flash image, the
//! diff and write planner, and the traits device personalities implement.
//!
//! # Example
//!
//! ```ignore
//! use nrfdude_core::{compute_plan, read_records, FlashImage, FlashGeometry, ProtectionPolicy};
//!
//! let records = read_records(std::io::BufReader::new(file))?;
//! let current = FlashImage::erased(FlashGeometry::NRF24LU1P);
//! let plan = compute_plan(&current, &records, ProtectionPolicy::PROTECTED)?;
//! for page in plan.pages() {
//!     println!("rewrite {}", page);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod channel;
pub mod error;
pub mod geometry;
pub mod ihex;
pub mod image;
pub mod plan;
pub mod programmer;
pub mod progress;

pub use channel::{Command, CommandChannel, DEFAULT_TIMEOUT};
pub use error::{Error, HexError, MalformedReason, PolicyError, Result, TransportError};
pub use geometry::{
    Address, Block, DirtyBitmap, FlashGeometry, Page, ProtectionPolicy, BLOCKS_PER_PAGE,
    BLOCK_SIZE, ERASED, PAGE_SIZE,
};
pub use ihex::{decode_stream, encode_record, read_records, write_image, HexRecord, RecordType};
pub use image::{read_full_image, BlockSource, FlashImage};
pub use plan::{compute_plan, WritePlan};
pub use programmer::{
    DeviceVariant, DeviceVersion, FlashProgrammer, ReadyPolicy, SessionConfig, UsbTarget,
};
pub use progress::{NoProgress, ProgramProgress, ProgramStats};
