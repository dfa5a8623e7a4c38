//! Error types for FileDeck.

use thiserror::Error;

use crate::client::{BrokerError, RegistryError};
use crate::transfer::TransferError;
use crate::upload::SessionError;

/// Common error type for FileDeck.
#[derive(Error, Debug)]
pub enum FileDeckError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signed-URL broker error.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Byte transfer error.
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Object registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Upload session misuse (e.g. starting a second transfer).
    #[error("upload session error: {0}")]
    Session(#[from] SessionError),

    /// HTTP client construction error.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Resource already exists.
    #[error("{0} already exists")]
    Conflict(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for FileDeck operations.
pub type Result<T> = std::result::Result<T, FileDeckError>;
