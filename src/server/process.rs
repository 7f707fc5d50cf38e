// src/server/process.rs
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use async_process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use os_pipe::PipeReader;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one run of the server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    // Private constructor, only usable within our crate
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The spawned server process
pub struct ServerProcess {
    /// Launch configuration
    config: ServerConfig,
    /// Session ID
    id: SessionId,
    /// Child process
    child: Option<Child>,
    /// Read end of the pipe shared by stdout and stderr
    output: Option<PipeReader>,
}

impl ServerProcess {
    /// Create a new, not yet started, server process from configuration
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            id: SessionId::new(),
            child: None,
            output: None,
        }
    }

    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// OS process id, once started
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Spawn the server with piped stdin and a single pipe carrying both stdout and stderr
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let (reader, writer) = os_pipe::pipe()
            .map_err(|e| Error::Launch(format!("Failed to create output pipe: {}", e)))?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| Error::Launch(format!("Failed to share output pipe: {}", e)))?;

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .current_dir(&self.config.working_dir)
            .kill_on_drop(true);

        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr_writer));

        let spawned = command.spawn();
        // The write ends held by `command` must close here, or the reader never sees EOF
        drop(command);

        let child = spawned.map_err(|e| {
            Error::Launch(format!(
                "Failed to start `{}` in {}: {}",
                self.config.command,
                self.config.working_dir.display(),
                e
            ))
        })?;

        tracing::info!(session_id = %self.id, pid = child.id(), "Spawned server process");
        self.child = Some(child);
        self.output = Some(reader);

        Ok(())
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        match &mut self.child {
            Some(child) => child
                .status()
                .await
                .map_err(|e| Error::Stream(format!("Failed to wait for process: {}", e))),
            None => Err(Error::NotRunning),
        }
    }

    /// Forcefully terminate the process
    pub fn kill(&mut self) -> Result<()> {
        match &mut self.child {
            Some(child) => child
                .kill()
                .map_err(|e| Error::Other(format!("Failed to kill process: {}", e))),
            None => Err(Error::NotRunning),
        }
    }

    /// Take the stdin pipe from the process
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        if let Some(child) = &mut self.child {
            child.stdin.take().ok_or_else(|| {
                Error::Launch("Failed to get stdin pipe from child process".to_string())
            })
        } else {
            Err(Error::NotRunning)
        }
    }

    /// Take the merged stdout and stderr pipe from the process
    pub fn take_output(&mut self) -> Result<PipeReader> {
        if self.child.is_none() {
            return Err(Error::NotRunning);
        }
        self.output.take().ok_or_else(|| {
            Error::Launch("Output pipe was already taken from the child process".to_string())
        })
    }
}
