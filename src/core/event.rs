use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Opaque session identifier, unique for the process lifetime and never
/// reused, so a command aimed at a destroyed session can never land on a
/// newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Why a session left its connected (or connecting) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The local side requested the close.
    LocalClose,
    /// The remote peer closed the connection.
    PeerClosed,
    /// The session manager is shutting down.
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::LocalClose => write!(f, "local close"),
            DisconnectReason::PeerClosed => write!(f, "peer closed"),
            DisconnectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Error categories surfaced to subscribers as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidEncoding,
    BufferOverrun,
    SendFailed,
    TransportFault,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidEncoding => write!(f, "invalid encoding"),
            ErrorKind::BufferOverrun => write!(f, "buffer overrun"),
            ErrorKind::SendFailed => write!(f, "send failed"),
            ErrorKind::TransportFault => write!(f, "transport fault"),
        }
    }
}

/// Session lifecycle and data events.
///
/// Immutable, ordered per session by emission time, delivered at most once
/// per subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Connected,
    DataReceived {
        bytes: Vec<u8>,
        /// Codec-rendered representation of `bytes`.
        text: String,
        timestamp: SystemTime,
    },
    DataSent {
        bytes: Vec<u8>,
        timestamp: SystemTime,
    },
    Disconnected {
        reason: DisconnectReason,
    },
    Error {
        kind: ErrorKind,
        detail: String,
    },
}
