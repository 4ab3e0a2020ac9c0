//! Candor Types - Pure type definitions shared by the store, cache and HTTP layers
//!
//! This crate contains only plain data types with no async runtime dependencies.

pub mod feedback;
pub mod user;

pub use feedback::*;
pub use user::*;

use thiserror::Error;

/// Numeric identity of a user row
pub type UserId = i64;

/// Numeric identity of a feedback row
pub type FeedbackId = i64;

/// Returned when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
