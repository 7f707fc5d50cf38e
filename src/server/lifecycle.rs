use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// Lifecycle state of the supervisor
///
/// `Idle → Launching → Running → Stopping → Idle`. A failed launch and a session
/// that ends on its own both return straight to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// No session
    Idle,
    /// Spawning the process
    Launching,
    /// Session is live
    Running,
    /// A stop has been requested and the process has not exited yet
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Synchronized holder of the current [`ServerState`]
///
/// Transitions are compare-and-set so two callers racing for the same
/// transition cannot both win.
#[derive(Debug)]
pub struct LifecycleState {
    state: Mutex<ServerState>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::Idle),
        }
    }

    /// Current state
    pub fn get(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves to `to` only if the current state is `from`. Returns the state found.
    fn transition(&self, from: ServerState, to: ServerState) -> Result<(), ServerState> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state != from {
            return Err(*state);
        }
        tracing::debug!(from = %from, to = %to, "Lifecycle transition");
        *state = to;
        Ok(())
    }

    /// `Idle → Launching`
    pub fn begin_launch(&self) -> Result<(), ServerState> {
        self.transition(ServerState::Idle, ServerState::Launching)
    }

    /// `Launching → Running`
    pub fn mark_running(&self) -> Result<(), ServerState> {
        self.transition(ServerState::Launching, ServerState::Running)
    }

    /// `Running → Stopping`
    pub fn begin_stopping(&self) -> Result<(), ServerState> {
        self.transition(ServerState::Running, ServerState::Stopping)
    }

    /// `Stopping → Running`, when a stop could not be delivered
    pub fn cancel_stopping(&self) -> Result<(), ServerState> {
        self.transition(ServerState::Stopping, ServerState::Running)
    }

    /// Any state `→ Idle`
    pub fn mark_idle(&self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state != ServerState::Idle {
            tracing::debug!(from = %*state, to = %ServerState::Idle, "Lifecycle transition");
        }
        *state = ServerState::Idle;
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let state = LifecycleState::new();
        assert_eq!(state.get(), ServerState::Idle);

        state.begin_launch().unwrap();
        assert_eq!(state.get(), ServerState::Launching);
        state.mark_running().unwrap();
        state.begin_stopping().unwrap();
        assert_eq!(state.get(), ServerState::Stopping);
        state.mark_idle();
        assert_eq!(state.get(), ServerState::Idle);
    }

    #[test]
    fn test_rejected_transitions_report_current_state() {
        let state = LifecycleState::new();
        state.begin_launch().unwrap();

        assert_eq!(state.begin_launch(), Err(ServerState::Launching));
        assert_eq!(state.begin_stopping(), Err(ServerState::Launching));

        state.mark_running().unwrap();
        state.begin_stopping().unwrap();
        assert_eq!(state.begin_stopping(), Err(ServerState::Stopping));
        assert_eq!(state.begin_launch(), Err(ServerState::Stopping));
    }
}
