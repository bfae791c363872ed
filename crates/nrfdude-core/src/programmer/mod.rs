//! Programmer traits and session configuration
//!
//! This module defines the trait every device personality implements and
//! the settings passed explicitly into each operation.

mod session;
mod traits;

pub use session::*;
pub use traits::*;
