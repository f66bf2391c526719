//! Error types for the AMI client and orchestrator

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors from the AMI session, the protocol parser, and the call-bridging
/// workflow.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AmiError {
    /// Underlying TCP I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation did not complete within its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The PBX rejected the Login action.
    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    /// The stream could not be parsed as AMI blocks.
    #[error("protocol error: {message}")]
    ProtocolError { message: String },

    /// The PBX closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// An action was sent on a session that is no longer connected.
    #[error("not connected")]
    NotConnected,

    /// Events were dropped because the application fell behind the stream.
    #[error("event queue full, events were dropped")]
    QueueFull,

    /// The PBX answered an Originate with `Response != Success`.
    #[error("originate rejected: {}{}", .response, .message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
    OriginateRejected {
        response: String,
        message: Option<String>,
    },

    /// The monitored call did not reach an answered state.
    #[error("{reason}")]
    NotAnswered { reason: String },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Writing or renaming a call file failed.
    #[error("call file spool failed at {path}: {source}")]
    Spool {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AmiError {
    /// Create a protocol error with a message.
    pub fn protocol_error(message: impl Into<String>) -> Self {
        AmiError::ProtocolError {
            message: message.into(),
        }
    }

    /// Create an authentication failure with a message.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        AmiError::AuthFailed {
            message: message.into(),
        }
    }
}
