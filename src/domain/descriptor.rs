use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection parameters for one transport variant.
///
/// Immutable once a session has been constructed from it. The serialized
/// form is owned by an external configuration loader; the core only defines
/// the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportDescriptor {
    #[serde(rename = "serial")]
    Serial {
        port: String,
        baud_rate: u32,
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
        #[serde(default)]
        parity: Parity,
        #[serde(default)]
        flow_control: FlowControl,
    },
    #[serde(rename = "tcp")]
    Tcp {
        host: String,
        port: u16,
        /// No implicit timeout: absent means the connect may block
        /// indefinitely.
        #[serde(default)]
        connect_timeout_ms: Option<u64>,
    },
    #[serde(rename = "udp")]
    Udp {
        host: String,
        port: u16,
        #[serde(default)]
        local_port: Option<u16>,
    },
    #[serde(rename = "websocket")]
    WebSocket {
        url: String,
        #[serde(default)]
        subprotocol: Option<String>,
        #[serde(default)]
        connect_timeout_ms: Option<u64>,
    },
}

impl TransportDescriptor {
    /// Human-readable endpoint label used in logs and summaries.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Serial { port, baud_rate, .. } => format!("{port}@{baud_rate}"),
            Self::Tcp { host, port, .. } => format!("tcp://{host}:{port}"),
            Self::Udp { host, port, .. } => format!("udp://{host}:{port}"),
            Self::WebSocket { url, .. } => url.clone(),
        }
    }

    /// Caller-supplied connect timeout, if the variant carries one.
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self {
            Self::Tcp { connect_timeout_ms, .. }
            | Self::WebSocket { connect_timeout_ms, .. } => {
                connect_timeout_ms.map(Duration::from_millis)
            }
            _ => None,
        }
    }
}

/// Serial parity configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Serial flow control configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Hardware,
    Software,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        FlowControl::None
    }
}

/// Display and wire representation of session payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    Raw,
    Hex,
    Ascii,
    Utf8,
}

impl std::fmt::Display for CodecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecMode::Raw => write!(f, "raw"),
            CodecMode::Hex => write!(f, "hex"),
            CodecMode::Ascii => write!(f, "ascii"),
            CodecMode::Utf8 => write!(f, "utf8"),
        }
    }
}

/// Payload representation plus optional frame terminator.
///
/// The terminator segments a byte stream into discrete messages; it is
/// ignored for datagram transports where each receive already yields one
/// complete message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_mode")]
    pub mode: CodecMode,
    #[serde(default)]
    pub terminator: Option<Vec<u8>>,
}

impl CodecConfig {
    pub fn new(mode: CodecMode) -> Self {
        Self { mode, terminator: None }
    }

    pub fn with_terminator(mut self, terminator: impl Into<Vec<u8>>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::new(default_mode())
    }
}

fn default_mode() -> CodecMode {
    CodecMode::Utf8
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}
