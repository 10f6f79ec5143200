//! Error types for ts3query
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using QueryError
pub type Result<T> = std::result::Result<T, QueryError>;

/// Unified error type for ts3query operations
#[derive(Debug, Error)]
pub enum QueryError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Precondition Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dispatcher is disposed")]
    Disposed,

    #[error("Dispatcher is not ready for commands")]
    NotReady,

    // -------------------------------------------------------------------------
    // Parse Errors
    // -------------------------------------------------------------------------
    #[error("Parse error: {reason} (raw: {raw:?})")]
    Parse { reason: String, raw: String },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection lost before the response arrived")]
    ConnectionLost,

    #[error("Timed out waiting for a response")]
    Timeout,
}

impl QueryError {
    /// Build a parse error carrying the offending raw text for diagnostics
    pub fn parse(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        QueryError::Parse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}
