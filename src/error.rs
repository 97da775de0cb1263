//! Error types for the inbox accessibility monitor.

use std::time::Duration;

/// Errors from assembling and running the monitor server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures talking to the external message store.
///
/// Reported to observers as a poll failure; the next tick is the retry.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Inbox at {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Inbox request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Inbox returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed inbox payload: {0}")]
    Malformed(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// The rule engine could not evaluate a specific document.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Document too large: {length} bytes > {max}")]
    DocumentTooLarge { length: usize, max: usize },

    #[error("Invalid selector {selector}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Evaluation task failed: {0}")]
    TaskFailed(String),
}

/// An observer sink rejected a write.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Observer disconnected")]
    Disconnected,

    #[error("Observer lagging: {capacity} events buffered")]
    Lagging { capacity: usize },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
