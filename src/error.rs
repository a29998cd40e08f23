//! Error types for image transfer operations

use thiserror::Error;

/// Image transfer error types
#[derive(Error, Debug)]
pub enum Error {
    /// No frame arrived within the configured timeout interval
    #[error("timed out after {seconds} s while waiting for {what}")]
    Timeout {
        /// Configured timeout in whole seconds
        seconds: u64,
        /// What the operation was waiting for
        what: &'static str,
    },

    /// Peer violated the wire protocol (unexpected token, frame or separator)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid image geometry or a buffer that does not match it
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure in the underlying messaging transport
    #[error("transport error: {0}")]
    Transport(#[from] zmq::Error),

    /// A text frame did not contain valid UTF-8
    #[error("text frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias for image transfer operations
pub type Result<T> = std::result::Result<T, Error>;
