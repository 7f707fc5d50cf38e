//! Error handling module for MC Runner.
//!
//! This module defines the error types used throughout the library.
//! Every lifecycle failure is reported, never fatal: the supervisor stays in a
//! well-defined state and the caller decides whether to retry.
//!
//! # Example
//!
//! ```
//! use mc_runner::error::{Error, Result};
//!
//! fn handle_error(result: Result<()>) {
//!     match result {
//!         Ok(_) => println!("Operation succeeded"),
//!         Err(Error::AlreadyRunning) => println!("Server is already running"),
//!         Err(Error::Launch(msg)) => println!("Could not launch server: {}", msg),
//!         Err(Error::Backup(msg)) => println!("Backup failed: {}", msg),
//!         Err(e) => println!("Other error: {}", e),
//!     }
//! }
//! ```
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur in the mc-runner library.
///
/// Each variant includes context information to help diagnose and handle the
/// error appropriately.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or parse configuration from a file or string.
    ///
    /// This error occurs when:
    /// - The configuration file cannot be read
    /// - The JSON or YAML is malformed
    /// - Field types are incorrect
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed fine but contains invalid values.
    ///
    /// This error occurs when:
    /// - The launch command is empty
    /// - The shutdown countdown is not strictly decreasing
    /// - The retention cap is below 2
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The server process could not be spawned.
    #[error("Failed to launch server: {0}")]
    Launch(String),

    /// A command could not be written to the server's input.
    ///
    /// This error occurs when:
    /// - No session is live
    /// - The input pipe is closed or the write fails
    #[error("Failed to send command: {0}")]
    Command(String),

    /// Reading the server's output failed or the stream closed unexpectedly.
    #[error("Output stream error: {0}")]
    Stream(String),

    /// Snapshot, compression or retention cleanup failed.
    #[error("Backup failed: {0}")]
    Backup(String),

    /// A session is already live (or launching).
    #[error("Already running")]
    AlreadyRunning,

    /// No session is live.
    #[error("Not running")]
    NotRunning,

    /// A graceful shutdown is already in progress for the live session.
    #[error("Shutdown already in progress")]
    ShutdownInProgress,

    /// A restart or backup was abandoned because the server was stopped from
    /// elsewhere while it counted down.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Coarse category of an [`Error`], carried by failure events on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Spawn error.
    Launch,
    /// Write to a dead or absent process.
    Command,
    /// Read error or unexpected stream closure.
    Stream,
    /// I/O error during snapshot or archive creation.
    Backup,
    /// Rejected lifecycle transition (already running, not running, stopping).
    Lifecycle,
    /// Bad configuration.
    Config,
    /// Anything else.
    Other,
}

impl Error {
    /// Returns the failure category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::ConfigParse(_) | Error::ConfigInvalid(_) => FailureKind::Config,
            Error::Launch(_) => FailureKind::Launch,
            Error::Command(_) => FailureKind::Command,
            Error::Stream(_) => FailureKind::Stream,
            Error::Backup(_) => FailureKind::Backup,
            Error::AlreadyRunning
            | Error::NotRunning
            | Error::ShutdownInProgress
            | Error::Cancelled(_) => FailureKind::Lifecycle,
            Error::Timeout(_) | Error::Other(_) => FailureKind::Other,
        }
    }
}

/// Result type for mc-runner operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Launch("x".into()).kind(), FailureKind::Launch);
        assert_eq!(Error::Command("x".into()).kind(), FailureKind::Command);
        assert_eq!(Error::Stream("x".into()).kind(), FailureKind::Stream);
        assert_eq!(Error::Backup("x".into()).kind(), FailureKind::Backup);
        assert_eq!(Error::AlreadyRunning.kind(), FailureKind::Lifecycle);
        assert_eq!(Error::ShutdownInProgress.kind(), FailureKind::Lifecycle);
        assert_eq!(Error::Cancelled("x".into()).kind(), FailureKind::Lifecycle);
        assert_eq!(Error::ConfigInvalid("x".into()).kind(), FailureKind::Config);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Backup("disk full".to_string());
        assert_eq!(err.to_string(), "Backup failed: disk full");
    }
}
