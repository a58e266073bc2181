//! Server lifecycle state machine.
//!
//! # State Transitions
//! ```text
//! Stopped  → Starting: activate()
//! Starting → Running:  listener bound
//! Starting → Stopped:  identity, registration or bind failed
//! Running  → Stopping: deactivate()
//! Stopping → Stopped:  shutdown returned (any outcome)
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        }
    }

    /// A start may be issued from here.
    pub fn can_start(&self) -> bool {
        matches!(self, ServerState::Stopped)
    }

    /// A stop may be issued from here.
    pub fn can_stop(&self) -> bool {
        matches!(self, ServerState::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards() {
        assert!(ServerState::default().can_start());
        for state in [ServerState::Starting, ServerState::Running, ServerState::Stopping] {
            assert!(!state.can_start(), "{state}");
        }
        assert!(ServerState::Running.can_stop());
        for state in [ServerState::Stopped, ServerState::Starting, ServerState::Stopping] {
            assert!(!state.can_stop(), "{state}");
        }
    }
}
