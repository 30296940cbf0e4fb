//! CommLink Core Library
//!
//! Multi-protocol communication client core: one uniform session model
//! over serial, TCP, UDP and WebSocket transports, with pluggable data
//! representation and an ordered per-session event stream. Presentation
//! layers (GUI, CLI, loggers) consume the [`SessionManager`] command
//! surface and subscribe to its events; the core owns no UI and persists
//! nothing.

pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::descriptor::{CodecConfig, CodecMode, FlowControl, Parity, TransportDescriptor};
pub use domain::error::{CodecError, CommLinkError, CommLinkResult, OpenError, SendError};

pub use crate::core::event::{DisconnectReason, ErrorKind, Event, SessionId};
pub use crate::core::session::{
    ConnectionState, CoreConfig, EventStream, SessionManager, SessionSummary,
};
pub use crate::core::transport::{
    SystemTransportFactory, Transport, TransportEvent, TransportFactory, TransportKind,
};
