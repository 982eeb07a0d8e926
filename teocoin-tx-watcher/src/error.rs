use thiserror::Error;

/// Errors surfaced synchronously to callers of the poller and observer.
///
/// Only misuse and invalid configuration are reported this way; everything
/// that goes wrong while a cycle is running is retried in the background.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("transaction identifier must not be empty")]
    EmptyIdentifier,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("status polling requires a running Tokio runtime")]
    NoRuntime,
}

/// A failed status query. Every variant is transient: the poller logs it and
/// tries again on the next tick.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status endpoint answered with HTTP {0}")]
    HttpStatus(u16),

    #[error("could not decode status response: {0}")]
    Decode(String),

    #[error("invalid status URL: {0}")]
    InvalidUrl(String),

    #[error("unknown transaction status '{0}'")]
    UnknownStatus(String),

    #[error("status query did not complete within {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}
