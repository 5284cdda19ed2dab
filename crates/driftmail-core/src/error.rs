//! Driftmail error type.

use thiserror::Error;

/// Errors surfaced by any Driftmail crate.
#[derive(Debug, Error)]
pub enum DriftmailError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DriftmailError>;
