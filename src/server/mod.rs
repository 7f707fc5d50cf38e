//! Server supervision module for MC Runner.
//!
//! This module launches the game server, tracks its lifecycle, feeds its
//! output through classification and stops it either immediately or after a
//! player-facing countdown. All public components are instrumented with
//! `tracing` spans.
//!
//! # Components
//!
//! * `lifecycle` - The `Idle → Launching → Running → Stopping` state cell
//! * `monitor` - Periodic `list` polling to resync the player count
//! * `process` - Spawning and reaping the server process
//! * `session` - The live session and its [`Console`](crate::transport::Console)
//! * `shutdown` - Countdown plans and the sequencer that runs them
//! * `supervisor` - [`ProcessSupervisor`], which ties the above together
//!
//! # Examples
//!
//! Running the standard countdown against a live console:
//!
//! ```no_run
//! use mc_runner::server::{ShutdownPlan, ShutdownReason, ShutdownSequencer};
//! use mc_runner::transport::Console;
//!
//! async fn stop_for_restart(console: &dyn Console) -> mc_runner::Result<()> {
//!     let sequencer = ShutdownSequencer::new(ShutdownPlan::standard());
//!     let outcome = sequencer.run(console, ShutdownReason::Restart).await?;
//!     println!("Countdown ended: {:?}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! Checking lifecycle transitions:
//!
//! ```
//! use mc_runner::server::{LifecycleState, ServerState};
//!
//! let state = LifecycleState::new();
//! state.begin_launch().unwrap();
//! assert_eq!(state.begin_launch(), Err(ServerState::Launching));
//! ```
pub mod lifecycle;
pub mod monitor;
mod process;
mod session;
pub mod shutdown;
mod supervisor;

pub use lifecycle::{LifecycleState, ServerState};
pub use monitor::{LIST_COMMAND, PlayerListPoller};
pub use process::{ServerProcess, SessionId};
pub use session::{ServerSession, SessionConsole};
pub use shutdown::{ShutdownOutcome, ShutdownPlan, ShutdownReason, ShutdownSequencer};
pub use supervisor::{ControlRequest, ProcessSupervisor};
