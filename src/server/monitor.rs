use crate::transport::Console;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// The command whose reply resyncs the player roster.
pub const LIST_COMMAND: &str = "list";

/// Periodically asks the server for its player list.
///
/// Each tick is gated on the session being alive and not shutting down; the
/// reply comes back through the normal output stream and is picked up there.
pub struct PlayerListPoller {
    /// Poll period
    interval: Duration,
    /// Poll task
    task: Option<JoinHandle<()>>,
}

impl PlayerListPoller {
    /// Start polling `console` every `interval`. The first poll happens one interval in.
    pub fn start(interval: Duration, console: Arc<dyn Console>) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if !console.is_alive() {
                    break;
                }
                if console.stop_requested() {
                    continue;
                }

                if let Err(e) = console.send_command(LIST_COMMAND).await {
                    tracing::debug!(error = %e, "Player list poll failed");
                }
            }
        });

        Self {
            interval,
            task: Some(task),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop polling
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PlayerListPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
