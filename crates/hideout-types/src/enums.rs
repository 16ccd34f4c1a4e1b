//! Enumeration types for the session engine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the active session.
///
/// `Idle` is initial. `Complete` and `Failed` are terminal until the next
/// explicit start or restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No session has been started on the current level.
    #[default]
    Idle,
    /// The clock is running and finds are accepted.
    Playing,
    /// Every object was found before time ran out.
    Complete,
    /// Time ran out first.
    Failed,
}

impl SessionState {
    /// Whether the state ends a session.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// How an object is positioned on each (re)start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    /// Reset to its authored transform.
    Fixed,
    /// Moved to a shuffled candidate position with a random yaw.
    Randomized,
}

/// Discriminant of a [`SessionEvent`](crate::SessionEvent), used to
/// subscribe to a single notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A session started.
    GameStarted,
    /// A new object was found.
    ObjectFound,
    /// The last object was found.
    AllFound,
    /// Periodic countdown update.
    TimeElapsed,
    /// Terminal outcome of the session.
    GameComplete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_complete_and_failed_are_terminal() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Playing.is_terminal());
        assert!(SessionState::Complete.is_terminal());
        assert!(SessionState::Failed.is_terminal());
    }
}
