use crate::error::{Error, Result};
use crate::server::process::{ServerProcess, SessionId};
use crate::transport::{Console, STOP_COMMAND, StdinWriter};
use async_process::ExitStatus;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

/// One run of the server process, from launch to exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSession {
    /// Session ID
    pub id: SessionId,
    /// OS process id
    pub pid: Option<u32>,
    /// When the process was spawned
    pub started_at: DateTime<Local>,
}

/// [`Console`] of a live session.
///
/// Owns the write side of the child's stdin and observes the exit signal
/// published by the session task. The process handle itself lives in the exit
/// waiter; this type can only ask it to die.
pub struct SessionConsole {
    session: ServerSession,
    writer: StdinWriter,
    stop_sent: AtomicBool,
    stop_signal: watch::Sender<bool>,
    exited: watch::Receiver<bool>,
    kill: Arc<Notify>,
    exit_timeout: Option<Duration>,
}

impl SessionConsole {
    pub(crate) fn new(
        session: ServerSession,
        writer: StdinWriter,
        exited: watch::Receiver<bool>,
        kill: Arc<Notify>,
        exit_timeout: Option<Duration>,
    ) -> Self {
        Self {
            session,
            writer,
            stop_sent: AtomicBool::new(false),
            stop_signal: watch::Sender::new(false),
            exited,
            kill,
            exit_timeout,
        }
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    /// Asks the exit waiter to kill the process.
    pub fn kill(&self) {
        tracing::warn!(session_id = %self.session.id, "Killing server process");
        self.kill.notify_one();
    }
}

async fn exit_observed(exited: &watch::Receiver<bool>) {
    let mut exited = exited.clone();
    // A dropped sender means the session task is gone, which only happens after exit.
    let _ = exited.wait_for(|done| *done).await.map(|_| ());
}

async fn stop_observed(signal: &watch::Sender<bool>) {
    let mut sent = signal.subscribe();
    let _ = sent.wait_for(|sent| *sent).await.map(|_| ());
}

#[async_trait]
impl Console for SessionConsole {
    async fn send_command(&self, command: &str) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::Command("Server is not running".to_string()));
        }
        self.writer.write_line(command).await
    }

    fn is_alive(&self) -> bool {
        !*self.exited.borrow()
    }

    fn stop_requested(&self) -> bool {
        self.stop_sent.load(Ordering::SeqCst)
    }

    async fn request_stop(&self) -> Result<bool> {
        if self.stop_sent.swap(true, Ordering::SeqCst) {
            tracing::debug!(session_id = %self.session.id, "Stop already sent");
            return Ok(false);
        }

        if let Err(e) = self.send_command(STOP_COMMAND).await {
            // Let a later request try again.
            self.stop_sent.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.stop_signal.send_replace(true);
        tracing::info!(session_id = %self.session.id, "Sent stop command");
        Ok(true)
    }

    async fn stopping(&self) {
        tokio::select! {
            _ = stop_observed(&self.stop_signal) => {}
            _ = exit_observed(&self.exited) => {}
        }
    }

    async fn wait_for_exit(&self) -> Result<()> {
        match self.exit_timeout {
            None => exit_observed(&self.exited).await,
            Some(limit) => {
                if tokio::time::timeout(limit, exit_observed(&self.exited))
                    .await
                    .is_err()
                {
                    tracing::warn!(
                        session_id = %self.session.id,
                        timeout_secs = limit.as_secs(),
                        "Server did not exit in time"
                    );
                    self.kill();
                    exit_observed(&self.exited).await;
                    return Err(Error::Timeout(format!(
                        "Server did not exit within {}s and was killed",
                        limit.as_secs()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Spawns the task that owns the process handle and awaits its exit.
///
/// A notification on `kill` terminates the process first.
pub(crate) fn spawn_exit_waiter(
    mut process: ServerProcess,
    kill: Arc<Notify>,
) -> JoinHandle<Result<ExitStatus>> {
    tokio::spawn(async move {
        let exited = tokio::select! {
            status = process.wait() => Some(status),
            _ = kill.notified() => None,
        };

        match exited {
            Some(status) => status,
            None => {
                if let Err(e) = process.kill() {
                    tracing::warn!(error = %e, "Kill failed, waiting for exit anyway");
                }
                process.wait().await
            }
        }
    })
}
