//! Line-based communication with the supervised server.
//!
//! The server speaks newline-terminated UTF-8 in both directions. This module
//! provides the [`Console`] trait, the seam through which shutdown sequencing
//! and player polling drive a live session, and the stdio plumbing behind it.
//!
//! # Examples
//!
//! Driving a console through the trait:
//!
//! ```no_run
//! use mc_runner::transport::Console;
//! use mc_runner::error::Result;
//!
//! async fn announce(console: &dyn Console) -> Result<()> {
//!     if console.is_alive() {
//!         console.send_command("say Maintenance in 5 minutes").await?;
//!     }
//!     Ok(())
//! }
//! ```
pub mod stdio;

use crate::error::Result;
use async_trait::async_trait;

pub use stdio::{StdinWriter, spawn_line_reader};

/// The terminal command that makes the server save and exit.
pub const STOP_COMMAND: &str = "stop";

/// Command channel of one live server session.
#[async_trait]
pub trait Console: Send + Sync {
    /// Writes `command` plus a newline to the server's input.
    async fn send_command(&self, command: &str) -> Result<()>;

    /// Whether the server process is still running.
    fn is_alive(&self) -> bool;

    /// Whether the terminal stop command has already been sent this session.
    fn stop_requested(&self) -> bool;

    /// Sends the terminal stop command unless it was already sent.
    ///
    /// Returns `true` if this call sent it.
    async fn request_stop(&self) -> Result<bool>;

    /// Resolves once the server process has exited.
    ///
    /// Returns `Error::Timeout` if the process had to be killed to get there.
    async fn wait_for_exit(&self) -> Result<()>;

    /// Resolves once the process has exited or the stop command has been sent.
    ///
    /// Consoles that cannot observe either never resolve.
    async fn stopping(&self) {
        std::future::pending::<()>().await
    }
}
