use thiserror::Error;

/// Failure to establish a transport connection or handle.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("device or host not found: {0}")]
    DeviceNotFound(String),

    #[error("permission denied opening {0}")]
    PermissionDenied(String),

    #[error("local address already in use: {0}")]
    AddressInUse(String),

    #[error("connection attempt timed out")]
    Timeout,

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
}

impl OpenError {
    /// Classify an I/O error raised while opening `target`.
    pub(crate) fn from_io(err: std::io::Error, target: &str) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => Self::DeviceNotFound(target.to_string()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(target.to_string()),
            ErrorKind::AddrInUse => Self::AddressInUse(target.to_string()),
            ErrorKind::TimedOut => Self::Timeout,
            _ => Self::HandshakeFailed(format!("{target}: {err}")),
        }
    }
}

/// Failure to transmit a payload on an established session.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("session is not connected")]
    NotConnected,

    #[error("write truncated after {written} of {expected} bytes")]
    Truncated { written: usize, expected: usize },

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("send queue full ({depth} pending)")]
    QueueFull { depth: usize },

    #[error("session is shutting down")]
    ChannelClosed,
}

/// Failure to convert between text and bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// CommLink unified error type.
#[derive(Error, Debug)]
pub enum CommLinkError {
    #[error("open error: {0}")]
    Open(#[from] OpenError),

    #[error("send error: {0}")]
    Send(#[from] SendError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("session error: {message}")]
    Session { message: String },
}

pub type CommLinkResult<T> = Result<T, CommLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_io_mapping() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such host");
        assert!(matches!(
            OpenError::from_io(err, "example.invalid:80"),
            OpenError::DeviceNotFound(_)
        ));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            OpenError::from_io(err, "/dev/ttyUSB0"),
            OpenError::PermissionDenied(_)
        ));

        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        assert!(matches!(
            OpenError::from_io(err, "0.0.0.0:9000"),
            OpenError::AddressInUse(_)
        ));

        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(matches!(OpenError::from_io(err, "host"), OpenError::Timeout));
    }

    #[test]
    fn test_error_display() {
        let error = CommLinkError::Session {
            message: "unknown session".to_string(),
        };
        assert!(error.to_string().contains("Session error")
            || error.to_string().contains("session error"));
        assert!(error.to_string().contains("unknown session"));

        assert_eq!(
            SendError::NotConnected.to_string(),
            "session is not connected"
        );
        assert!(OpenError::Timeout.to_string().contains("timed out"));
    }

    #[test]
    fn test_error_conversion() {
        let open: CommLinkError = OpenError::Timeout.into();
        assert!(matches!(open, CommLinkError::Open(OpenError::Timeout)));

        let send: CommLinkError = SendError::NotConnected.into();
        assert!(matches!(send, CommLinkError::Send(SendError::NotConnected)));
    }
}
