//! Error types for pipeline-notify

use thiserror::Error;

/// Errors that can occur while preparing or delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP session could not be created, connected, or authenticated
    #[error("Connection error: {0}")]
    Connection(String),

    /// Message could not be composed or the server rejected it
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Template placeholder could not be resolved
    #[error("Failed to render template '{template}': {reason}")]
    Template {
        template: String,
        reason: String,
    },

    /// Configuration error (unknown kind/status, malformed values)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for notification operations
pub type Result<T> = std::result::Result<T, NotifyError>;
