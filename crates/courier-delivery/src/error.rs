//! Error types for the delivery engine.
//!
//! Delivery faults against a destination (timeouts, refused connections,
//! HTTP error responses) are represented as attempt outcomes, not errors —
//! a processing cycle has no error path for network causes. The variants
//! here cover the engine's own infrastructure: storage, configuration,
//! queueing, and worker lifecycle.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for delivery engine operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error type for delivery engine infrastructure.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The persistence layer failed mid-cycle.
    #[error("database error: {message}")]
    Database {
        /// Database error message.
        message: String,
    },

    /// Engine or client configuration is invalid.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Configuration error message.
        message: String,
    },

    /// The delivery queue has shut down and accepts no more work.
    #[error("delivery queue is closed")]
    QueueClosed,

    /// The engine was started twice.
    #[error("delivery engine already started")]
    AlreadyStarted,

    /// Workers did not finish within the shutdown deadline.
    #[error("worker shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

impl DeliveryError {
    /// Creates a database error from a message.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into() }
    }

    /// Creates a configuration error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

impl From<courier_core::CoreError> for DeliveryError {
    fn from(err: courier_core::CoreError) -> Self {
        Self::Database { message: err.to_string() }
    }
}
