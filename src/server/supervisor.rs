use crate::backup::{BackupEngine, BackupOutcome};
use crate::config::{Config, validate_config};
use crate::error::{Error, Result};
use crate::events::{EventBus, ServerEvent};
use crate::output::{OutputEvent, PlayerRoster, RosterSnapshot};
use crate::server::lifecycle::{LifecycleState, ServerState};
use crate::server::monitor::PlayerListPoller;
use crate::server::process::{ServerProcess, SessionId};
use crate::server::session::{ServerSession, SessionConsole, spawn_exit_waiter};
use crate::server::shutdown::{
    ShutdownOutcome, ShutdownPlan, ShutdownReason, ShutdownSequencer,
};
use crate::transport::{Console, STOP_COMMAND, StdinWriter, spawn_line_reader};
use async_process::{ChildStdin, ExitStatus};
use os_pipe::PipeReader;
use chrono::Local;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Lines buffered between the output reader and the session task.
const LINE_BUFFER: usize = 64;

/// How long to keep reading output after the process has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A lifecycle operation to run in the background with [`ProcessSupervisor::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Start,
    Command(String),
    StopFast,
    StopSlow,
    Restart,
    Backup,
}

/// Supervises one game server process at a time.
///
/// The supervisor launches the server, feeds it commands, classifies everything it
/// prints and republishes it on the [`EventBus`], and stops it either immediately or
/// after a player-facing countdown. Restart and backup are sequenced on top of that.
///
/// Cloning is cheap and every clone controls the same server. All methods may be
/// called from any task; the blocking ones (`stop_*`, `restart`, `backup`) only
/// suspend the calling task, and [`submit`](Self::submit) runs them detached.
///
/// # Example
///
/// ```no_run
/// use mc_runner::{Config, ProcessSupervisor, ServerEvent};
/// use mc_runner::config::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> mc_runner::Result<()> {
///     let supervisor = ProcessSupervisor::new(Config::new(ServerConfig::java("1G", "3G", "server.jar")))?;
///     let mut events = supervisor.subscribe();
///
///     supervisor.start().await?;
///     while let Ok(event) = events.recv().await {
///         if let ServerEvent::Output(line) = event {
///             println!("[{}] {}", line.category, line.line);
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    plan: ShutdownPlan,
    backup: BackupEngine,
    bus: EventBus,
    state: LifecycleState,
    session: Mutex<Option<Arc<SessionConsole>>>,
    roster: watch::Sender<RosterSnapshot>,
}

enum SessionStep {
    Line(Option<Result<String>>),
    Exited(Result<ExitStatus>),
}

impl ProcessSupervisor {
    /// Create a supervisor from a configuration file path
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = Config::from_file(path)?;
        Self::new(config)
    }

    /// Create a supervisor from a validated configuration
    #[tracing::instrument(skip(config), fields(command = %config.server.command))]
    pub fn new(config: Config) -> Result<Self> {
        validate_config(&config)?;

        let backup = BackupEngine::new(config.backup.resolve_against(&config.server.working_dir));
        let plan = ShutdownPlan::new(config.shutdown.countdown.clone());
        let bus = EventBus::new(config.event_capacity);
        let (roster, _) = watch::channel(RosterSnapshot::default());

        tracing::info!("Creating new ProcessSupervisor");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                plan,
                backup,
                bus,
                state: LifecycleState::new(),
                session: Mutex::new(None),
                roster,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The bus every event is published on.
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Shorthand for `events().subscribe()`.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.bus.subscribe()
    }

    pub fn backup_engine(&self) -> &BackupEngine {
        &self.inner.backup
    }

    pub fn state(&self) -> ServerState {
        self.inner.state.get()
    }

    /// Whether a session is live and its process has not exited.
    pub fn is_running(&self) -> bool {
        self.inner.live_console().is_some()
    }

    /// The live session, if any.
    pub fn session(&self) -> Option<ServerSession> {
        self.inner
            .live_console()
            .map(|console| console.session().clone())
    }

    pub fn player_count(&self) -> usize {
        self.inner.roster.borrow().count
    }

    pub fn players(&self) -> RosterSnapshot {
        self.inner.roster.borrow().clone()
    }

    /// Launch the server.
    ///
    /// Reports "Server is already running." and returns `Error::AlreadyRunning`
    /// when a session exists; a spawn failure is reported and leaves the
    /// supervisor `Idle`.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<SessionId> {
        if let Err(state) = self.inner.state.begin_launch() {
            tracing::debug!(state = %state, "Start rejected");
            match state {
                ServerState::Stopping => self.inner.bus.status("Server is already stopping."),
                _ => self.inner.bus.status("Server is already running."),
            }
            return Err(Error::AlreadyRunning);
        }

        self.inner.bus.status("Starting server...");
        match self.inner.launch() {
            Ok(id) => {
                tracing::info!(session_id = %id, "Server started successfully");
                Ok(id)
            }
            Err(e) => {
                self.inner.state.mark_idle();
                self.inner.bus.failure(&e);
                Err(e)
            }
        }
    }

    /// Pass a command through to the server.
    ///
    /// A bare `stop` is routed through the same guard as the lifecycle stops, so
    /// the terminal command is never sent twice in one session.
    #[tracing::instrument(skip(self))]
    pub async fn send_command(&self, command: &str) -> Result<()> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(());
        }

        let Some(console) = self.inner.live_console() else {
            let e = Error::Command("Server is not running".to_string());
            self.inner.bus.failure(&e);
            return Err(e);
        };

        let result = if command == STOP_COMMAND {
            let _ = self.inner.state.begin_stopping();
            self.inner.bus.status("Stopping server...");
            console.request_stop().await.map(|_| ())
        } else {
            console.send_command(command).await
        };

        self.inner.report(result)
    }

    /// Send `stop` right away and wait until the process is gone.
    ///
    /// Allowed while a graceful stop is counting down; in that case it cuts the
    /// countdown short without sending `stop` a second time.
    #[tracing::instrument(skip(self))]
    pub async fn stop_fast(&self) -> Result<()> {
        let console = self.inner.require_console()?;
        let _ = self.inner.state.begin_stopping();
        self.inner.bus.status("Stopping server...");

        if let Err(e) = console.request_stop().await {
            self.inner.abandon_stop(&console);
            self.inner.bus.failure(&e);
            return Err(e);
        }

        self.inner.settle_exit(console.wait_for_exit().await)
    }

    /// Count down with in-game warnings, then stop and wait for exit.
    ///
    /// Rejected with `Error::ShutdownInProgress` if a stop is already under way.
    #[tracing::instrument(skip(self))]
    pub async fn stop_slow(&self, reason: ShutdownReason) -> Result<ShutdownOutcome> {
        let console = self.inner.require_console()?;

        if let Err(state) = self.inner.state.begin_stopping() {
            return Err(match state {
                ServerState::Stopping => {
                    self.inner.bus.status("Server is already stopping.");
                    Error::ShutdownInProgress
                }
                _ => {
                    self.inner.bus.status("Server is not running.");
                    Error::NotRunning
                }
            });
        }

        self.inner.bus.status("Stopping server...");
        if let Some(intent) = reason.intent() {
            if let Err(e) = console.send_command(&format!("say {}", intent)).await {
                tracing::warn!(error = %e, "Failed to announce {:?}", reason);
            }
        }

        let sequencer = ShutdownSequencer::new(self.inner.plan.clone());
        match sequencer.run(console.as_ref(), reason).await {
            Ok(outcome) => Ok(outcome),
            Err(e @ Error::Timeout(_)) => {
                self.inner.bus.failure(&e);
                Ok(ShutdownOutcome::Killed)
            }
            Err(e) => {
                self.inner.abandon_stop(&console);
                self.inner.bus.failure(&e);
                Err(e)
            }
        }
    }

    /// Graceful stop, then start again with the same configuration.
    ///
    /// If the countdown is cut short by a fast stop or the server dies during it,
    /// the server stays down and `Error::Cancelled` is returned.
    #[tracing::instrument(skip(self))]
    pub async fn restart(&self) -> Result<SessionId> {
        self.inner.require_console()?;
        self.inner.bus.status("Restarting server...");

        let outcome = self.stop_slow(ShutdownReason::Restart).await?;
        self.inner.proceed_after(outcome, "Restart")?;
        self.start().await
    }

    /// Graceful stop, back up the worlds, start again.
    ///
    /// With no server running this only takes the backup. A failed backup is
    /// reported and returned, but the server is started again regardless. A
    /// countdown cut short by a fast stop abandons the whole cycle, like
    /// [`restart`](Self::restart).
    #[tracing::instrument(skip(self))]
    pub async fn backup(&self) -> Result<BackupOutcome> {
        if self.state() == ServerState::Idle {
            return self.inner.run_backup().await;
        }

        self.inner.require_console()?;
        self.inner.bus.status("Backup server...");
        let outcome = self.stop_slow(ShutdownReason::Backup).await?;
        self.inner.proceed_after(outcome, "Backup")?;

        let result = self.inner.run_backup().await;

        self.inner.bus.status("Restarting server...");
        if let Err(e) = self.start().await {
            tracing::error!(error = %e, "Failed to start server after backup");
        }

        result
    }

    /// Run `request` on its own task. The outcome is only reported on the bus.
    pub fn submit(&self, request: ControlRequest) -> JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let result = match &request {
                ControlRequest::Start => supervisor.start().await.map(|_| ()),
                ControlRequest::Command(command) => supervisor.send_command(command).await,
                ControlRequest::StopFast => supervisor.stop_fast().await,
                ControlRequest::StopSlow => supervisor
                    .stop_slow(ShutdownReason::Stop)
                    .await
                    .map(|_| ()),
                ControlRequest::Restart => supervisor.restart().await.map(|_| ()),
                ControlRequest::Backup => supervisor.backup().await.map(|_| ()),
            };

            if let Err(e) = result {
                tracing::debug!(request = ?request, error = %e, "Control request failed");
            }
        })
    }
}

impl Inner {
    fn session_slot(&self) -> MutexGuard<'_, Option<Arc<SessionConsole>>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live_console(&self) -> Option<Arc<SessionConsole>> {
        self.session_slot()
            .as_ref()
            .filter(|console| console.is_alive())
            .cloned()
    }

    /// Live console, or "Server is not running." and `Error::NotRunning`.
    fn require_console(&self) -> Result<Arc<SessionConsole>> {
        self.live_console().ok_or_else(|| {
            self.bus.status("Server is not running.");
            Error::NotRunning
        })
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.bus.failure(e);
        }
        result
    }

    /// A process killed after the exit timeout is still stopped; report it and carry on.
    fn settle_exit(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(e @ Error::Timeout(_)) => {
                self.bus.failure(&e);
                Ok(())
            }
            other => other,
        }
    }

    /// Whether a stop-then-start cycle may go on after its countdown.
    ///
    /// A stop this cycle did not send means someone wanted the server down.
    fn proceed_after(&self, outcome: ShutdownOutcome, operation: &str) -> Result<()> {
        match outcome {
            ShutdownOutcome::Completed | ShutdownOutcome::Killed => Ok(()),
            ShutdownOutcome::Interrupted => {
                tracing::info!(operation, "Countdown interrupted, leaving the server stopped");
                self.bus.status(format!("{} cancelled, server stays stopped.", operation));
                Err(Error::Cancelled(format!(
                    "{} interrupted before the server was restarted",
                    operation
                )))
            }
        }
    }

    /// Back to `Running` after a stop that never reached the server.
    fn abandon_stop(&self, console: &SessionConsole) {
        if console.is_alive() && !console.stop_requested() {
            let _ = self.state.cancel_stopping();
        }
    }

    fn launch(self: &Arc<Self>) -> Result<SessionId> {
        let mut process = ServerProcess::new(self.config.server.clone());
        process.start()?;

        let id = process.id();
        let pid = process.pid();
        let (stdin, output) = match take_pipes(&mut process) {
            Ok(pipes) => pipes,
            Err(e) => {
                let _ = process.kill();
                return Err(e);
            }
        };

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        spawn_line_reader(output, "output", line_tx);

        let kill = Arc::new(Notify::new());
        let waiter = spawn_exit_waiter(process, Arc::clone(&kill));
        let (exit_tx, exit_rx) = watch::channel(false);

        let session = ServerSession {
            id,
            pid,
            started_at: Local::now(),
        };
        let console = Arc::new(SessionConsole::new(
            session,
            StdinWriter::new(id.to_string(), stdin),
            exit_rx,
            kill,
            self.config.shutdown.exit_timeout(),
        ));

        self.roster.send_replace(RosterSnapshot::default());
        *self.session_slot() = Some(Arc::clone(&console));
        let _ = self.state.mark_running();

        let poller = self.config.player_poll_interval().map(|interval| {
            PlayerListPoller::start(interval, Arc::clone(&console) as Arc<dyn Console>)
        });

        self.bus.status("Server started.");

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner
                .run_session(console, line_rx, waiter, exit_tx, poller)
                .await;
        });

        Ok(id)
    }

    /// Owns the session from launch to exit: classifies output in order,
    /// maintains the roster, and tears the session down once the process is gone.
    async fn run_session(
        self: Arc<Self>,
        console: Arc<SessionConsole>,
        mut lines: mpsc::Receiver<Result<String>>,
        mut waiter: JoinHandle<Result<ExitStatus>>,
        exit_tx: watch::Sender<bool>,
        poller: Option<PlayerListPoller>,
    ) {
        let session_id = console.session().id;
        let mut roster = PlayerRoster::new();

        let status = loop {
            let step = tokio::select! {
                biased;
                line = lines.recv() => SessionStep::Line(line),
                status = &mut waiter => SessionStep::Exited(flatten_exit(status)),
            };

            match step {
                SessionStep::Line(Some(line)) => self.handle_line(line, &mut roster),
                SessionStep::Line(None) => {
                    tracing::debug!(session_id = %session_id, "Output stream closed");
                    break flatten_exit(waiter.await);
                }
                SessionStep::Exited(status) => {
                    self.drain_output(&mut lines, &mut roster).await;
                    break status;
                }
            }
        };

        drop(poller);

        let requested = console.stop_requested();
        let exit_code = status.as_ref().ok().and_then(ExitStatus::code);

        *self.session_slot() = None;
        self.state.mark_idle();

        roster.reset();
        self.roster.send_replace(roster.snapshot());
        self.bus.player_count(0);

        match status {
            Ok(_) if requested => self.bus.status("Server stopped."),
            Ok(status) => self.bus.failure(&Error::Stream(format!(
                "Server exited unexpectedly ({})",
                status
            ))),
            Err(e) => self.bus.failure(&e),
        }
        self.bus.publish(ServerEvent::Exited {
            exit_code,
            requested,
        });

        tracing::info!(session_id = %session_id, ?exit_code, requested, "Session ended");
        exit_tx.send_replace(true);
    }

    fn handle_line(&self, line: Result<String>, roster: &mut PlayerRoster) {
        let raw = match line {
            Ok(raw) => raw,
            Err(e) => {
                self.bus.failure(&e);
                return;
            }
        };

        let event = OutputEvent::from_raw(&raw);
        tracing::debug!(category = %event.category, line = %event.line, "Server output");

        // The snapshot is current before subscribers see the line that changed it
        let count_before = roster.count();
        if roster.apply(&event) {
            self.roster.send_replace(roster.snapshot());
        }
        self.bus.output(event);

        if roster.count() != count_before {
            self.bus.player_count(roster.count());
        }
    }

    async fn drain_output(
        &self,
        lines: &mut mpsc::Receiver<Result<String>>,
        roster: &mut PlayerRoster,
    ) {
        loop {
            match tokio::time::timeout(OUTPUT_DRAIN_GRACE, lines.recv()).await {
                Ok(Some(line)) => self.handle_line(line, roster),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!("Output still open after the server exited, giving up on it");
                    break;
                }
            }
        }
    }

    async fn run_backup(&self) -> Result<BackupOutcome> {
        let engine = self.backup.clone();
        let result = tokio::task::spawn_blocking(move || engine.make_backup())
            .await
            .map_err(|e| Error::Backup(format!("Backup task failed: {}", e)))
            .and_then(|result| result);

        match &result {
            Ok(outcome) => self.bus.status(outcome.message()),
            Err(e) => self.bus.failure(e),
        }
        result
    }
}

fn take_pipes(process: &mut ServerProcess) -> Result<(ChildStdin, PipeReader)> {
    Ok((process.take_stdin()?, process.take_output()?))
}

fn flatten_exit(
    joined: std::result::Result<Result<ExitStatus>, tokio::task::JoinError>,
) -> Result<ExitStatus> {
    joined.map_err(|e| Error::Stream(format!("Exit waiter failed: {}", e)))?
}
