// Error types for peercache
//
// This module defines the error types used throughout the cache.

use thiserror::Error;

/// Result type alias for peercache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while serving a cache request
///
/// The enum is `Clone` because one in-flight load is shared by every caller
/// that coalesced onto it; all of them receive the same error.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Get was called with an empty key
    #[error("key must not be empty")]
    EmptyKey,

    /// The loader callback failed; nothing was cached
    #[error("loader error: {0}")]
    Loader(String),

    /// A remote peer could not serve the key (transport failure or non-200)
    #[error("peer error: {0}")]
    Peer(String),

    /// The in-flight load for this key panicked before producing a result
    #[error("load aborted: in-flight call panicked")]
    Aborted,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Peer(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Loader(err.to_string())
    }
}
