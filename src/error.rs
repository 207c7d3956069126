//! Error types for a3s-kiosk

use thiserror::Error;

/// Errors that can occur in the kiosk enforcement core
///
/// Host-originated kinds are never fatal: the engine degrades to fallback
/// enforcement or logs and continues. Only configuration and command
/// parsing errors are reported back to the caller.
#[derive(Debug, Error)]
pub enum KioskError {
    /// The platform denied or lacks the exclusive-foreground capability
    #[error("Pinning unavailable: {0}")]
    PinningUnavailable(String),

    /// Subscribing to a broadcast channel failed
    #[error("Failed to register receiver on '{channel}': {reason}")]
    Registration { channel: String, reason: String },

    /// A host API failed during a best-effort action
    #[error("Host error: {0}")]
    Host(String),

    /// A bounded host call did not complete in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bridge command name not in the closed command set
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl KioskError {
    /// Whether this error should reach the hosted application
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KioskError::Config(_) | KioskError::Serialization(_) | KioskError::UnknownCommand(_)
        )
    }
}

/// Result type alias for kiosk operations
pub type Result<T> = std::result::Result<T, KioskError>;
