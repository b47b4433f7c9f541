//! Error types for gatewire.

use thiserror::Error;

/// Main error type for all gatewire operations.
#[derive(Debug, Error)]
pub enum GatewireError {
    /// I/O error during listener/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (configuration boundary only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Codec error: truncated frame, unknown kind tag, or invalid fixed prefix.
    ///
    /// Connection-fatal for the transport session that produced the bytes;
    /// there is no valid recovery frame to send.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Stream-level violation (ordering, window overrun, unknown stream).
    ///
    /// Resolved by closing the offending stream with Reset or Abort, never by
    /// failing the worker.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Result type alias using GatewireError.
pub type Result<T> = std::result::Result<T, GatewireError>;
