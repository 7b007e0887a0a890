//! Typed error hierarchy for the retrieval core.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MemsieveError>;

/// Errors surfaced across the provider boundary.
///
/// `Lock` is never returned to a caller — the read/write lock always
/// terminates cleanly — but it is kept as a variant so internal plumbing
/// has somewhere to put a defensive `unreachable`-avoiding error rather
/// than panicking.
#[derive(Debug, Error)]
pub enum MemsieveError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock error: {0}")]
    Lock(String),
}

impl MemsieveError {
    #[must_use]
    pub fn transport(attempts: u32, source: impl Into<anyhow::Error>) -> Self {
        Self::Transport {
            attempts,
            source: source.into(),
        }
    }
}
