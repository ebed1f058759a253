//! Error types for credshield.
//!
//! This module defines the error type shared by the record store, the exposure
//! channels, configuration loading and the CLI. The coordinator itself never
//! returns these from its lifecycle operations; it resolves every failure to a
//! skipped channel or a full shutdown and only logs the error.

use thiserror::Error;

use crate::record::RecordId;

/// The main error type for credshield operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Record Store Errors ===
    /// The requested record is not present in the store.
    #[error("record {id} not found")]
    RecordNotFound {
        /// Identifier that was looked up.
        id: RecordId,
    },

    /// The record store is locked and cannot serve records.
    #[error("record store is locked")]
    StoreLocked,

    /// A record identifier could not be parsed.
    #[error("invalid record id '{input}': {reason}")]
    InvalidRecordId {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    // === Channel Errors ===
    /// An outward channel or its backing OS service is not available.
    #[error("{channel} is unavailable: {message}")]
    ChannelUnavailable {
        /// Name of the channel or service.
        channel: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// Reading or writing the system clipboard failed.
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// An input-method operation failed.
    #[error("input method error: {0}")]
    InputMethod(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for credshield operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a channel unavailable error.
    #[must_use]
    pub fn channel_unavailable(channel: &'static str, message: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            channel,
            message: message.into(),
        }
    }

    /// Create a new clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Create a new input method error.
    #[must_use]
    pub fn input_method(message: impl Into<String>) -> Self {
        Self::InputMethod(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means a channel should be skipped.
    #[must_use]
    pub fn is_channel_unavailable(&self) -> bool {
        matches!(self, Self::ChannelUnavailable { .. })
    }

    /// Check if this error means the requested record is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}
