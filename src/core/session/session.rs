use crate::core::codec;
use crate::core::event::{DisconnectReason, ErrorKind, Event, SessionId};
use crate::core::frame::FrameBuffer;
use crate::core::session::state::ConnectionState;
use crate::core::transport::{Transport, TransportEvent, TransportFactory};
use crate::domain::descriptor::{CodecConfig, TransportDescriptor};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the transport-to-session channel. Bounded so a slow session
/// applies backpressure to the receive loop instead of queueing without
/// limit.
const TRANSPORT_CHANNEL_CAPACITY: usize = 64;

/// Commands accepted by a session task.
pub(crate) enum SessionCommand {
    Send(String),
    Close(DisconnectReason),
}

/// Manager-side handle to one live session.
pub(crate) struct SessionHandle {
    pub descriptor: TransportDescriptor,
    pub created_at: SystemTime,
    pub state: Arc<RwLock<ConnectionState>>,
    pub commands: mpsc::Sender<SessionCommand>,
    /// Taken by whoever awaits the session's terminal state.
    pub task: Option<JoinHandle<()>>,
}

/// One logical connection: one transport, one codec, one frame buffer and
/// the state machine binding them. Runs as an independent task; the
/// command channel serializes outbound traffic, so a send never overlaps
/// another send on the same session.
struct Session {
    id: SessionId,
    codec: CodecConfig,
    state: Arc<RwLock<ConnectionState>>,
    frame: FrameBuffer,
    overrun_active: bool,
    events: mpsc::UnboundedSender<(SessionId, Event)>,
}

/// Starts a session task for `descriptor` and returns the handle the
/// manager keeps. The task drives Idle → Connecting immediately; the
/// outcome of the open surfaces as a `Connected` or `Error` event.
pub(crate) fn spawn(
    id: SessionId,
    descriptor: TransportDescriptor,
    codec: CodecConfig,
    factory: Arc<dyn TransportFactory>,
    events: mpsc::UnboundedSender<(SessionId, Event)>,
    frame_buffer_capacity: usize,
    send_queue_depth: usize,
) -> SessionHandle {
    let state = Arc::new(RwLock::new(ConnectionState::Idle));
    let (commands_tx, commands_rx) = mpsc::channel(send_queue_depth);

    let session = Session {
        id,
        codec,
        state: Arc::clone(&state),
        frame: FrameBuffer::new(frame_buffer_capacity),
        overrun_active: false,
        events,
    };
    let task = tokio::spawn(session.run(descriptor.clone(), factory, commands_rx));

    SessionHandle {
        descriptor,
        created_at: SystemTime::now(),
        state,
        commands: commands_tx,
        task: Some(task),
    }
}

impl Session {
    async fn run(
        mut self,
        descriptor: TransportDescriptor,
        factory: Arc<dyn TransportFactory>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) {
        self.set_state(ConnectionState::Connecting).await;
        let (transport_tx, mut transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);

        let mut transport = match factory.open(&descriptor, transport_tx).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!(
                    "session {} failed to open {}: {}",
                    self.id,
                    descriptor.endpoint(),
                    e
                );
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                self.emit(Event::Error {
                    kind: ErrorKind::TransportFault,
                    detail: e.to_string(),
                });
                return;
            }
        };

        // Terminator framing only applies to byte-stream transports; a
        // datagram already arrives as one complete message.
        let framed = transport.kind().is_stream()
            && self.codec.terminator.as_ref().is_some_and(|t| !t.is_empty());

        self.set_state(ConnectionState::Connected).await;
        self.emit(Event::Connected);
        info!("session {} connected to {}", self.id, descriptor.endpoint());

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Send(text)) => {
                        self.handle_send(transport.as_mut(), &text).await;
                    }
                    Some(SessionCommand::Close(reason)) => {
                        self.disconnect(transport.as_mut(), reason).await;
                        break;
                    }
                    None => {
                        self.disconnect(transport.as_mut(), DisconnectReason::LocalClose)
                            .await;
                        break;
                    }
                },
                signal = transport_rx.recv() => match signal {
                    Some(TransportEvent::Data(chunk)) => self.handle_chunk(chunk, framed),
                    Some(TransportEvent::Closed(reason)) => {
                        self.flush_residue();
                        transport.close().await;
                        self.set_state(ConnectionState::Disconnected).await;
                        self.emit(Event::Disconnected { reason });
                        info!("session {} disconnected ({})", self.id, reason);
                        break;
                    }
                    other => {
                        let detail = match other {
                            Some(TransportEvent::Fault(detail)) => detail,
                            _ => "receive loop ended unexpectedly".to_string(),
                        };
                        self.flush_residue();
                        transport.close().await;
                        self.set_state(ConnectionState::Failed(detail.clone())).await;
                        warn!("session {} transport fault: {}", self.id, detail);
                        self.emit(Event::Error {
                            kind: ErrorKind::TransportFault,
                            detail,
                        });
                        break;
                    }
                },
            }
        }
    }

    /// Local close: Disconnecting, then Disconnected once the transport
    /// confirms closure. Any partial frame is flushed before the terminal
    /// event so buffered data is not lost.
    async fn disconnect(&mut self, transport: &mut dyn Transport, reason: DisconnectReason) {
        self.set_state(ConnectionState::Disconnecting).await;
        transport.close().await;
        self.flush_residue();
        self.set_state(ConnectionState::Disconnected).await;
        self.emit(Event::Disconnected { reason });
        info!("session {} closed ({})", self.id, reason);
    }

    async fn handle_send(&mut self, transport: &mut dyn Transport, text: &str) {
        let bytes = match codec::encode(text, self.codec.mode) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Codec errors are recovered locally; the session stays up.
                self.emit(Event::Error {
                    kind: ErrorKind::InvalidEncoding,
                    detail: e.to_string(),
                });
                return;
            }
        };

        match transport.send(&bytes).await {
            Ok(()) => {
                debug!("session {} sent {} bytes", self.id, bytes.len());
                self.emit(Event::DataSent {
                    bytes,
                    timestamp: SystemTime::now(),
                });
            }
            Err(e) => {
                // A single failed send does not imply disconnection; UDP
                // sends can fail per-packet.
                self.emit(Event::Error {
                    kind: ErrorKind::SendFailed,
                    detail: e.to_string(),
                });
            }
        }
    }

    fn handle_chunk(&mut self, chunk: Vec<u8>, framed: bool) {
        if chunk.is_empty() {
            return;
        }

        if !framed {
            self.emit_received(chunk);
            return;
        }

        let evicted = self.frame.append(&chunk);
        if evicted {
            if !self.overrun_active {
                self.overrun_active = true;
                self.emit(Event::Error {
                    kind: ErrorKind::BufferOverrun,
                    detail: format!(
                        "frame buffer overrun, oldest bytes evicted (capacity {})",
                        self.frame.capacity()
                    ),
                });
            }
        } else {
            // Overrun episode ends with the first append that fits.
            self.overrun_active = false;
        }

        let terminator = match self.codec.terminator.clone() {
            Some(terminator) => terminator,
            None => return,
        };
        while let Some(frame) = self.frame.drain_up_to(&terminator) {
            self.emit_received(frame);
        }
    }

    fn flush_residue(&mut self) {
        let residue = self.frame.drain_residue();
        if !residue.is_empty() {
            self.emit_received(residue);
        }
    }

    fn emit_received(&mut self, bytes: Vec<u8>) {
        let text = codec::decode(&bytes, self.codec.mode);
        self.emit(Event::DataReceived {
            bytes,
            text,
            timestamp: SystemTime::now(),
        });
    }

    fn emit(&self, event: Event) {
        if self.events.send((self.id, event)).is_err() {
            debug!("session {} event dropped, manager gone", self.id);
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }
}
