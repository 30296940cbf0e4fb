use crate::core::event::DisconnectReason;
use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::error::{OpenError, SendError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 4096;

/// TCP client transport; owns one connected stream.
///
/// The read half lives in the receive task; aborting that task on close
/// drops the half and unblocks the pending read without polling.
pub struct TcpTransport {
    writer: OwnedWriteHalf,
    rx_task: JoinHandle<()>,
    closed: bool,
    peer: String,
}

impl TcpTransport {
    pub(crate) async fn open(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, OpenError> {
        let peer = format!("{host}:{port}");

        let connect = TcpStream::connect((host, port));
        let stream = match connect_timeout {
            // A timed-out connect drops the pending attempt, so no
            // partially-opened handle survives.
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| OpenError::Timeout)?,
            None => connect.await,
        }
        .map_err(|e| OpenError::from_io(e, &peer))?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY on {}: {}", peer, e);
        }
        info!("TCP connection established to {}", peer);

        let (reader, writer) = stream.into_split();
        let rx_task = tokio::spawn(receive_loop(reader, events));

        Ok(Self {
            writer,
            rx_task,
            closed: false,
            peer,
        })
    }
}

async fn receive_loop(mut reader: OwnedReadHalf, events: mpsc::Sender<TransportEvent>) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("TCP peer closed the connection");
                let _ = events
                    .send(TransportEvent::Closed(DisconnectReason::PeerClosed))
                    .await;
                break;
            }
            Ok(n) => {
                debug!("received {} bytes over TCP", n);
                if events
                    .send(TransportEvent::Data(buffer[..n].to_vec()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Fault(e.to_string())).await;
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::NotConnected);
        }
        self.writer
            .write_all(data)
            .await
            .map_err(|e| SendError::PeerUnreachable(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| SendError::PeerUnreachable(e.to_string()))?;
        debug!("sent {} bytes over TCP", data.len());
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.writer.shutdown().await {
            debug!("TCP shutdown on {} returned: {}", self.peer, e);
        }
        // Cancelling the receive task drops the read half, releasing the
        // socket even if a read is pending.
        self.rx_task.abort();
        info!("TCP transport to {} closed", self.peer);
    }
}
