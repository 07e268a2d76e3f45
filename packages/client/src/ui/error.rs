//! Error types for the CLI client.

use thiserror::Error;

use crate::domain::StorageError;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Shared storage could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Terminal input could not be initialized
    #[error("Readline error: {0}")]
    Readline(String),
}
