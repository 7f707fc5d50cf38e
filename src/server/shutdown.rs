use crate::config::{CountdownStep, ShutdownConfig};
use crate::error::Result;
use crate::transport::Console;
use serde::Serialize;
use std::time::Duration;

/// Why the server is being stopped. Selects the wording of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// Plain stop.
    Stop,
    /// Stop followed by a start.
    Restart,
    /// Stop, back up the worlds, start again.
    Backup,
}

impl ShutdownReason {
    /// Countdown message shown to players with `remaining_secs` left.
    pub fn warning(&self, remaining_secs: u32) -> String {
        let unit = if remaining_secs == 1 { "second" } else { "seconds" };
        match self {
            ShutdownReason::Stop => format!("Server stops in {} {}", remaining_secs, unit),
            ShutdownReason::Restart => format!("Server restarts in {} {}", remaining_secs, unit),
            ShutdownReason::Backup => format!(
                "Server stops for a backup in {} {}",
                remaining_secs, unit
            ),
        }
    }

    /// Broadcast sent before the countdown starts, if the operation announces itself.
    pub fn intent(&self) -> Option<&'static str> {
        match self {
            ShutdownReason::Stop => None,
            ShutdownReason::Restart => Some("Server-Restart started .."),
            ShutdownReason::Backup => Some("Server-Backup started .."),
        }
    }
}

/// Ordered countdown checkpoints ending in the terminal `stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownPlan {
    steps: Vec<CountdownStep>,
}

impl ShutdownPlan {
    pub fn new(steps: Vec<CountdownStep>) -> Self {
        Self { steps }
    }

    /// 30, 15, 10, 5, 4, 3, 2, 1 seconds.
    pub fn standard() -> Self {
        Self::new(ShutdownConfig::default().countdown)
    }

    /// Same announcements with no pauses in between.
    pub fn immediate(&self) -> Self {
        Self::new(
            self.steps
                .iter()
                .map(|step| CountdownStep {
                    remaining_secs: step.remaining_secs,
                    wait_ms: 0,
                })
                .collect(),
        )
    }

    pub fn steps(&self) -> &[CountdownStep] {
        &self.steps
    }

    /// Total time spent announcing before `stop` is sent.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(CountdownStep::wait).sum()
    }
}

impl Default for ShutdownPlan {
    fn default() -> Self {
        Self::standard()
    }
}

/// How a countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every warning was broadcast and this sequencer sent `stop`.
    Completed,
    /// Someone else sent `stop` (a fast stop) or the process died mid-countdown.
    Interrupted,
    /// The process outlived the exit timeout and was killed.
    Killed,
}

/// Runs a [`ShutdownPlan`] against a live console: broadcast each warning with
/// `say`, sleep until the next checkpoint, then send `stop` and wait for exit.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSequencer {
    plan: ShutdownPlan,
}

impl ShutdownSequencer {
    pub fn new(plan: ShutdownPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &ShutdownPlan {
        &self.plan
    }

    /// Execute the countdown and graceful stop.
    ///
    /// The countdown is abandoned as soon as the process is gone or the terminal
    /// command was sent by someone else, even mid-pause; warnings already broadcast
    /// stay broadcast.
    /// Either way this resolves only once the process has exited.
    #[tracing::instrument(skip(self, console), fields(steps = self.plan.steps.len()))]
    pub async fn run(&self, console: &dyn Console, reason: ShutdownReason) -> Result<ShutdownOutcome> {
        for step in &self.plan.steps {
            if !console.is_alive() || console.stop_requested() {
                tracing::info!(remaining_secs = step.remaining_secs, "Countdown interrupted");
                console.wait_for_exit().await?;
                return Ok(ShutdownOutcome::Interrupted);
            }

            let warning = reason.warning(step.remaining_secs);
            console.send_command(&format!("say {}", warning)).await?;
            tracing::debug!(remaining_secs = step.remaining_secs, "Broadcast shutdown warning");

            tokio::select! {
                _ = tokio::time::sleep(step.wait()) => {}
                _ = console.stopping() => {}
            }
        }

        let sent = console.request_stop().await?;
        console.wait_for_exit().await?;

        Ok(if sent {
            ShutdownOutcome::Completed
        } else {
            ShutdownOutcome::Interrupted
        })
    }
}
