//! Outcome of a cache-backed read.
//!
//! A read can miss for two very different reasons: the record does not exist,
//! or the store could not be asked. Callers map these to different HTTP
//! statuses, so they are kept apart instead of collapsing into `Option`.

use crate::error::CandorError;

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Served from the cache or the store.
    Found(T),
    /// The store answered and has no such record.
    NotFound,
    /// Not cached, and the store could not be reached.
    StoreUnavailable,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into a `Result`, describing a missing record with `what`.
    pub fn require(self, what: impl FnOnce() -> String) -> Result<T, CandorError> {
        match self {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(CandorError::NotFound(what())),
            Lookup::StoreUnavailable => Err(CandorError::StoreUnavailable(format!(
                "{} is not cached and the store is unreachable",
                what()
            ))),
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}
