use serde::{Deserialize, Serialize};

/// Connection lifecycle of one session.
///
/// Transitions are performed only by the session's own control logic.
/// `Disconnected` and `Failed` are terminal; a new session must be created
/// to retry, which keeps the failure reason immutable and auditable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Failed(String),
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed(_)
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Failure reason if the session failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}
