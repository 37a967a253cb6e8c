//! Unified error types.

use thiserror::Error;

/// The error type returned by stitch's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures and startup misconfiguration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// A deployment misconfiguration detected while building a
/// [`CorrelationConfig`](crate::CorrelationConfig).
///
/// These are raised at startup, never per request. A process that cannot
/// build an identifier prefix should refuse to start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Application name and environment both slug to nothing.
    #[error("app name and app env are both empty; cannot build a correlation id prefix")]
    MissingIdentity,

    #[error("invalid header name `{0}`")]
    InvalidHeaderName(String),
}
