/*!
 # MC Runner

 A Rust library for supervising a Minecraft-style game server process and
 keeping dated backups of its worlds.

 ## Overview

 MC Runner provides functionality to:
 - Start the server process and pass console commands through to it
 - Classify every output line as chat, player join, player leave or plain log
 - Track the number of online players from the join/leave stream
 - Stop the server immediately or after an in-game countdown
 - Restart the server, or stop it for a backup and bring it back up
 - Snapshot world directories into one compressed archive per day and cap how many are kept

 ## Basic Usage

 ```no_run
 use mc_runner::{ProcessSupervisor, Result, ServerEvent};
 use mc_runner::server::ShutdownReason;

 #[tokio::main]
 async fn main() -> Result<()> {
     // Create a supervisor from a config file
     let supervisor = ProcessSupervisor::from_config_file("mc-runner.yaml")?;
     let mut events = supervisor.subscribe();

     supervisor.start().await?;

     // Print what the server says until the last player has left
     while let Ok(event) = events.recv().await {
         match event {
             ServerEvent::Output(line) => println!("[{}] {}", line.category, line.line),
             ServerEvent::PlayerCount { count: 0 } => break,
             ServerEvent::PlayerCount { count } => println!("{} players online", count),
             _ => {}
         }
     }

     // Warn players, then stop
     supervisor.stop_slow(ShutdownReason::Stop).await?;

     Ok(())
 }
 ```

 ## Features

 - **Process Supervision**: One server at a time, with a guarded lifecycle
 - **Output Classification**: Chat, join, leave and log streams with a derived player count
 - **Graceful Shutdown**: Countdown broadcasts before `stop`, which is sent at most once per session
 - **Backups**: Daily tar.gz snapshots with a retention cap
 - **Configuration**: JSON or YAML config files
 - **Events**: Everything observable is published on a broadcast bus
*/

pub mod backup;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod server;
pub mod transport;

pub use backup::{BackupEngine, BackupOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventBus, ServerEvent};
pub use output::{OutputCategory, OutputEvent};
pub use server::{ControlRequest, ProcessSupervisor, ServerState, SessionId};
