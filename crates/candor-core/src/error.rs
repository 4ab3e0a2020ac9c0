//! Error types for Candor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CandorError>;

#[derive(Error, Debug)]
pub enum CandorError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CandorError {
    pub fn validation(message: impl Into<String>) -> Self {
        CandorError::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn invalid_fields(message: impl Into<String>, errors: Vec<String>) -> Self {
        CandorError::Validation {
            message: message.into(),
            errors,
        }
    }

    /// True for failures that mean the backing store could not be reached.
    ///
    /// These are the only errors the data-access layer converts into a
    /// cache fallback; constraint violations and missing rows propagate.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, CandorError::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_unavailable_triggers_fallback() {
        assert!(CandorError::StoreUnavailable("timeout".into()).is_store_failure());
        assert!(!CandorError::Conflict("username taken".into()).is_store_failure());
        assert!(!CandorError::NotFound("user 9".into()).is_store_failure());
    }

    #[test]
    fn test_validation_keeps_field_errors() {
        let err = CandorError::invalid_fields("Invalid data", vec!["strengths: required".into()]);
        match err {
            CandorError::Validation { message, errors } => {
                assert_eq!(message, "Invalid data");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
