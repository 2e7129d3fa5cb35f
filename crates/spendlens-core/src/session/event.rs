use serde::{Deserialize, Serialize};

use super::SessionStatus;

/// Why a session transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Successful credential exchange (login or post-registration login).
    Login,
    /// Explicit logout.
    Logout,
    /// The server rejected the session credentials.
    Unauthorized,
    /// Credentials could not be persisted; the session was dropped.
    PersistFailed,
}

/// Notification emitted on every session transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub previous: SessionStatus,
    pub current: SessionStatus,
    pub cause: TransitionCause,
    /// Monotonic transition counter of the emitting session manager.
    pub epoch: u64,
}

impl SessionEvent {
    /// True when the transition left the client anonymous, i.e. pages that
    /// require authentication must send the user back to the login entry point.
    pub fn requires_login(&self) -> bool {
        self.previous.is_authenticated() && !self.current.is_authenticated()
    }
}
