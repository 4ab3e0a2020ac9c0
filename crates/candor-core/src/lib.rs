//! Candor Core Library
//!
//! Domain error, lookup outcome and the store ports the data-access layer is
//! written against.

// Re-export pure types from candor-types
pub use candor_types::*;

pub mod error;
pub mod lookup;
pub mod ports;

pub use error::{CandorError, Result};
pub use lookup::Lookup;
