//! Errors from the selection layer.

use cinder_core::CoreError;
use thiserror::Error;

/// Convenience alias for results within the select crate.
pub type Result<T> = std::result::Result<T, SelectError>;

/// Errors that can occur while building or narrowing a selection.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("no platform or device matched '{query}'")]
    NoMatch { query: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Turns a filter's `None` into [`SelectError::NoMatch`] for `?`-style callers.
pub trait MatchExt<T> {
    fn or_no_match(self, query: impl Into<String>) -> Result<T>;
}

impl<T> MatchExt<T> for Option<T> {
    fn or_no_match(self, query: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| SelectError::NoMatch {
            query: query.into(),
        })
    }
}
