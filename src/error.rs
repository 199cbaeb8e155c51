//! Error types.

use std::time::Duration;

/// Error type for contact-relay.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Relay config is invalid: {0}")]
    Config(#[from] serini::Error),
    #[error("Required setting `{0}` is missing")]
    MissingConfig(&'static str),
    #[error("Setting `{key}` is invalid: {reason}")]
    InvalidConfig { key: &'static str, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("SMTP relay error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Mail dispatch timed out after {0:?}")]
    DispatchTimeout(Duration),
    #[error("Rate limiter lock is poisoned")]
    LockPoisoned,
}
