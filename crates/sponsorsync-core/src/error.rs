//! Error types for the sponsor synchronization engine
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for sponsorsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the sponsor synchronization engine
#[derive(Error, Debug)]
pub enum Error {
    /// Request parameters could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Network-level failure (connect, timeout, reading the body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream answered with a status code other than 200
    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// The outer `{ec, em, data}` envelope could not be parsed
    #[error("Envelope decode error: {0}")]
    EnvelopeDecode(String),

    /// Upstream reported a logical failure (`ec != 200`)
    #[error("Upstream error ({code}): {message}")]
    Upstream {
        /// The envelope's `ec` field
        code: i64,
        /// The envelope's `em` field, verbatim
        message: String,
    },

    /// The envelope's `data` did not match the expected shape
    #[error("Payload decode error: {0}")]
    PayloadDecode(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a serialization error
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create an envelope decode error
    pub fn envelope_decode(msg: impl Into<String>) -> Self {
        Self::EnvelopeDecode(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(code: i64, message: impl Into<String>) -> Self {
        Self::Upstream {
            code,
            message: message.into(),
        }
    }

    /// Create a payload decode error
    pub fn payload_decode(msg: impl Into<String>) -> Self {
        Self::PayloadDecode(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}
