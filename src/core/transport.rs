use crate::core::event::DisconnectReason;
use crate::domain::descriptor::TransportDescriptor;
use crate::domain::error::{OpenError, SendError};
use crate::infrastructure::{SerialTransport, TcpTransport, UdpTransport, WebSocketTransport};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Transport variant discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Serial,
    Tcp,
    Udp,
    WebSocket,
}

impl TransportKind {
    /// Byte-stream transports need terminator framing; message transports
    /// deliver one complete message per receive.
    pub fn is_stream(self) -> bool {
        matches!(self, TransportKind::Serial | TransportKind::Tcp)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::WebSocket => write!(f, "websocket"),
        }
    }
}

impl From<&TransportDescriptor> for TransportKind {
    fn from(descriptor: &TransportDescriptor) -> Self {
        match descriptor {
            TransportDescriptor::Serial { .. } => TransportKind::Serial,
            TransportDescriptor::Tcp { .. } => TransportKind::Tcp,
            TransportDescriptor::Udp { .. } => TransportKind::Udp,
            TransportDescriptor::WebSocket { .. } => TransportKind::WebSocket,
        }
    }
}

/// Raw signals from a transport's receive loop to its owning session.
///
/// The loop emits `Data` chunks as they arrive and terminates after sending
/// `Closed` or `Fault`, each reported exactly once.
#[derive(Debug)]
pub enum TransportEvent {
    Data(Vec<u8>),
    Closed(DisconnectReason),
    Fault(String),
}

/// Capability set common to all transport variants.
///
/// One value owns exactly one OS handle. Opening spawns the variant's
/// receive loop as an independent task wired to the channel handed to the
/// factory; `close` stops that loop by releasing the handle rather than by
/// polling a flag.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Writes the full payload. Callers never invoke this concurrently for
    /// one session; the session serializes its outbound traffic.
    async fn send(&mut self, data: &[u8]) -> Result<(), SendError>;

    /// Releases the OS handle and stops the receive loop. Idempotent and
    /// safe to call from any state.
    async fn close(&mut self);
}

/// Opens transports from descriptors.
///
/// Swappable so tests can substitute doubles that track open/close calls
/// without touching real devices or sockets.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        descriptor: &TransportDescriptor,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, OpenError>;
}

/// Factory wiring each descriptor variant to its OS-backed transport.
pub struct SystemTransportFactory;

#[async_trait]
impl TransportFactory for SystemTransportFactory {
    async fn open(
        &self,
        descriptor: &TransportDescriptor,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, OpenError> {
        match descriptor {
            TransportDescriptor::Serial {
                port,
                baud_rate,
                data_bits,
                stop_bits,
                parity,
                flow_control,
            } => {
                let transport = SerialTransport::open(
                    port,
                    *baud_rate,
                    *data_bits,
                    *stop_bits,
                    *parity,
                    *flow_control,
                    events,
                )
                .await?;
                Ok(Box::new(transport))
            }
            TransportDescriptor::Tcp { host, port, .. } => {
                let transport =
                    TcpTransport::open(host, *port, descriptor.connect_timeout(), events).await?;
                Ok(Box::new(transport))
            }
            TransportDescriptor::Udp {
                host,
                port,
                local_port,
            } => {
                let transport = UdpTransport::open(host, *port, *local_port, events).await?;
                Ok(Box::new(transport))
            }
            TransportDescriptor::WebSocket {
                url, subprotocol, ..
            } => {
                let transport = WebSocketTransport::open(
                    url,
                    subprotocol.as_deref(),
                    descriptor.connect_timeout(),
                    events,
                )
                .await?;
                Ok(Box::new(transport))
            }
        }
    }
}
