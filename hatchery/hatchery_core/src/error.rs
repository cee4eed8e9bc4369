//! Error types for the hatchery isolate runtime.
//!
//! This module defines the error hierarchy used throughout the system.
//! Errors are organized by concern, with each concern having its own error
//! type. The root error type, `Error`, can wrap any of them, allowing for
//! uniform error handling at the top level.

use thiserror::Error;

/// Root error type for the hatchery system.
#[derive(Debug, Error)]
pub enum Error {
    /// Spawn lifecycle errors
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// Execution engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Control-plane transport errors
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to spawning isolates.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The requested id is already pending or active
    #[error("Isolate id already in use: {0}")]
    DuplicateId(String),

    /// Engine creation failed for the given isolate
    #[error("Engine creation failed for isolate {id}: {reason}")]
    CreationFailed { id: String, reason: String },

    /// The spawn request was abandoned before the isolate became ready
    #[error("Spawn of isolate {0} was cancelled")]
    Cancelled(String),
}

/// Errors reported by an execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not produce a running execution context
    #[error("Failed to create execution context: {0}")]
    CreationFailed(String),

    /// The engine could not release a running execution context
    #[error("Failed to destroy execution context: {0}")]
    DestroyFailed(String),

    /// The entry-point reference did not resolve to executable code
    #[error("Entry point could not be resolved: {0}")]
    UnresolvedEntryPoint(String),

    /// The registrant hook failed while setting up a new context
    #[error("Registrant setup failed: {0}")]
    RegistrantFailed(String),
}

/// Errors on the control-plane transport.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested method is not part of the control protocol
    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    /// The arguments for a known method did not decode
    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },

    /// The peer end of the control channel is gone
    #[error("Control channel closed")]
    ChannelClosed,
}

/// Result type alias using the root error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(SpawnError::DuplicateId("worker-1".to_string()));
        assert_eq!(
            err.to_string(),
            "Spawn error: Isolate id already in use: worker-1"
        );

        let err = Error::from(EngineError::CreationFailed("boom".to_string()));
        assert_eq!(
            err.to_string(),
            "Engine error: Failed to create execution context: boom"
        );
    }

    #[test]
    fn test_control_error_conversion() {
        let err: Error = ControlError::NotImplemented("pause_isolate".to_string()).into();
        assert!(matches!(
            err,
            Error::Control(ControlError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_cancelled_mentions_isolate() {
        let err = SpawnError::Cancelled("worker-2".to_string());
        assert!(err.to_string().contains("worker-2"));
    }
}
