use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::error::{OpenError, SendError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Largest datagram the receive loop can deliver without truncation.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// UDP transport; owns one bound socket.
///
/// "Connected" means bound and ready to send/receive: the socket is
/// `connect`ed to fix the peer address, but no packet is exchanged and no
/// acknowledgment exists. Each received datagram is one complete message.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    rx_task: JoinHandle<()>,
    closed: bool,
    peer: String,
}

impl UdpTransport {
    pub(crate) async fn open(
        host: &str,
        port: u16,
        local_port: Option<u16>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, OpenError> {
        let local = format!("0.0.0.0:{}", local_port.unwrap_or(0));
        let socket = UdpSocket::bind(local.as_str())
            .await
            .map_err(|e| OpenError::from_io(e, &local))?;

        let peer = format!("{host}:{port}");
        socket
            .connect((host, port))
            .await
            .map_err(|e| OpenError::from_io(e, &peer))?;

        if let Ok(addr) = socket.local_addr() {
            info!("UDP socket bound to {} for peer {}", addr, peer);
        }

        let socket = Arc::new(socket);
        let rx_task = tokio::spawn(receive_loop(Arc::clone(&socket), events));

        Ok(Self {
            socket,
            rx_task,
            closed: false,
            peer,
        })
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, events: mpsc::Sender<TransportEvent>) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        match socket.recv(&mut buffer).await {
            Ok(n) => {
                debug!("received {} byte datagram", n);
                if events
                    .send(TransportEvent::Data(buffer[..n].to_vec()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            // A connected socket surfaces ICMP port-unreachable here; that
            // is a per-packet condition, not a dead link.
            Err(ref e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                debug!("ICMP unreachable from peer, ignoring");
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Fault(e.to_string())).await;
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::NotConnected);
        }

        let written = self.socket.send(data).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                SendError::PeerUnreachable(self.peer.clone())
            } else {
                SendError::PeerUnreachable(e.to_string())
            }
        })?;

        if written != data.len() {
            return Err(SendError::Truncated {
                written,
                expected: data.len(),
            });
        }
        debug!("sent {} byte datagram to {}", written, self.peer);
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Cancelling the receive task releases its socket reference; the
        // handle closes once the last reference drops with this transport.
        self.rx_task.abort();
        info!("UDP transport to {} closed", self.peer);
    }
}
