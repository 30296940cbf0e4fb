use crate::core::event::{DisconnectReason, Event, SessionId};
use crate::core::session::session::{self, SessionCommand, SessionHandle};
use crate::core::session::state::ConnectionState;
use crate::core::transport::{SystemTransportFactory, TransportFactory, TransportKind};
use crate::domain::descriptor::{CodecConfig, TransportDescriptor};
use crate::domain::error::{CommLinkError, CommLinkResult, SendError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

/// Tuning knobs for the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Maximum number of live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Inbound frame buffer capacity per session, in bytes.
    #[serde(default = "default_frame_buffer_capacity")]
    pub frame_buffer_capacity: usize,
    /// Queued outbound sends per session before sends are rejected.
    #[serde(default = "default_send_queue_depth")]
    pub send_queue_depth: usize,
    /// Events buffered per subscriber before a slow subscriber starts
    /// skipping.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_sessions() -> usize {
    16
}

fn default_frame_buffer_capacity() -> usize {
    64 * 1024
}

fn default_send_queue_depth() -> usize {
    32
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            frame_buffer_capacity: default_frame_buffer_capacity(),
            send_queue_depth: default_send_queue_depth(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Snapshot of one live session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub endpoint: String,
    pub kind: TransportKind,
    pub state: ConnectionState,
    pub created_at: SystemTime,
}

/// Owns the set of active sessions, multiplexes their events into one
/// stream and enforces lifecycle and shutdown ordering.
///
/// Explicitly constructed and passed to consumers; there is no global
/// instance. Every session's events funnel through one aggregation channel
/// and fan out to subscribers, so events from one session always arrive in
/// emission order while different sessions interleave arbitrarily.
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
    factory: Arc<dyn TransportFactory>,
    config: CoreConfig,
    events_tx: mpsc::UnboundedSender<(SessionId, Event)>,
    broadcast_tx: broadcast::Sender<(SessionId, Event)>,
    shutting_down: AtomicBool,
    _pump: tokio::task::JoinHandle<()>,
}

impl SessionManager {
    /// Create a manager backed by the OS transports.
    pub fn new(config: CoreConfig) -> Self {
        Self::with_factory(config, Arc::new(SystemTransportFactory))
    }

    /// Create a manager with a custom transport factory. Tests use this to
    /// substitute transport doubles that track open/close calls.
    pub fn with_factory(config: CoreConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let pump_tx = broadcast_tx.clone();
        let pump = tokio::spawn(async move {
            while let Some(tagged) = events_rx.recv().await {
                // Err means no live subscribers; the event is discarded.
                let _ = pump_tx.send(tagged);
            }
        });

        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            factory,
            config,
            events_tx,
            broadcast_tx,
            shutting_down: AtomicBool::new(false),
            _pump: pump,
        }
    }

    /// Create and start a session for `descriptor`.
    ///
    /// Returns as soon as the session is registered; the open runs
    /// asynchronously and its outcome surfaces as a `Connected` or `Error`
    /// event followed by the matching state.
    pub async fn create_session(
        &self,
        descriptor: TransportDescriptor,
        codec: CodecConfig,
    ) -> CommLinkResult<SessionId> {
        let mut sessions = self.sessions.write().await;

        // Checked under the registry lock so a create racing shutdown
        // cannot slip a session past the shutdown sweep.
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(CommLinkError::Session {
                message: "session manager is shut down".to_string(),
            });
        }
        if sessions.len() >= self.config.max_sessions {
            return Err(CommLinkError::Session {
                message: format!(
                    "maximum number of sessions ({}) reached",
                    self.config.max_sessions
                ),
            });
        }

        let id = SessionId::generate();
        let handle = session::spawn(
            id,
            descriptor,
            codec,
            Arc::clone(&self.factory),
            self.events_tx.clone(),
            self.config.frame_buffer_capacity,
            self.config.send_queue_depth,
        );
        info!("created session {} for {}", id, handle.descriptor.endpoint());
        sessions.insert(id, handle);

        Ok(id)
    }

    /// Queue `text` for transmission on session `id`.
    ///
    /// Fails with `NotConnected` until the session has connected and after
    /// it reaches a terminal state. Overlapping sends queue up to the
    /// configured depth; beyond that the send is rejected and an
    /// `Error{SendFailed}` event is emitted.
    pub async fn send(&self, id: SessionId, text: &str) -> CommLinkResult<()> {
        let sessions = self.sessions.read().await;
        let handle = sessions.get(&id).ok_or_else(|| CommLinkError::Session {
            message: format!("unknown session {id}"),
        })?;

        if !handle.state.read().await.is_connected() {
            return Err(SendError::NotConnected.into());
        }

        match handle
            .commands
            .try_send(SessionCommand::Send(text.to_string()))
        {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.events_tx.send((
                    id,
                    Event::Error {
                        kind: crate::core::event::ErrorKind::SendFailed,
                        detail: format!(
                            "send queue full ({} pending)",
                            self.config.send_queue_depth
                        ),
                    },
                ));
                Err(SendError::QueueFull {
                    depth: self.config.send_queue_depth,
                }
                .into())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ChannelClosed.into()),
        }
    }

    /// Close session `id` and wait for it to reach a terminal state.
    ///
    /// Idempotent: closing an unknown or already-destroyed session is not
    /// an error, since ids are never reused.
    pub async fn close_session(&self, id: SessionId) -> CommLinkResult<()> {
        self.close_internal(id, DisconnectReason::LocalClose).await;
        Ok(())
    }

    /// Current connection state of session `id`, if it still exists.
    pub async fn session_state(&self, id: SessionId) -> Option<ConnectionState> {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(handle) => Some(handle.state.read().await.clone()),
            None => None,
        }
    }

    /// Snapshot of all live sessions.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries = Vec::with_capacity(sessions.len());
        for (id, handle) in sessions.iter() {
            summaries.push(SessionSummary {
                id: *id,
                endpoint: handle.descriptor.endpoint(),
                kind: TransportKind::from(&handle.descriptor),
                state: handle.state.read().await.clone(),
                created_at: handle.created_at,
            });
        }
        summaries
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Subscribe to the event stream across all sessions.
    ///
    /// Events from one session arrive in emission order; ordering across
    /// sessions is unspecified. Subscribers only see events emitted after
    /// they subscribe.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.broadcast_tx.subscribe(),
        }
    }

    /// Close every live session and wait for each to reach a terminal
    /// state. No transport handle survives this call. Idempotent.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let ids: Vec<SessionId> = self.sessions.read().await.keys().copied().collect();
        for id in ids {
            self.close_internal(id, DisconnectReason::Shutdown).await;
        }
        info!("session manager shut down");
    }

    async fn close_internal(&self, id: SessionId, reason: DisconnectReason) {
        let (commands, task) = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(&id) {
                None => return,
                Some(handle) => (handle.commands.clone(), handle.task.take()),
            }
        };

        // The command is ignored if the session already reached a terminal
        // state on its own; joining the task is what matters.
        let _ = commands.send(SessionCommand::Close(reason)).await;
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("session {} task ended abnormally: {}", id, e);
            }
        }

        self.sessions.write().await.remove(&id);
        debug!("session {} removed after reaching terminal state", id);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if !self.shutting_down.load(Ordering::SeqCst) {
            warn!("SessionManager dropped without shutdown - sessions may not be properly closed");
        }
    }
}

/// Subscriber view of the manager's event stream.
pub struct EventStream {
    receiver: broadcast::Receiver<(SessionId, Event)>,
}

impl EventStream {
    /// Next event across all sessions; `None` once the manager is gone and
    /// the backlog is drained. A subscriber that falls behind its buffer
    /// skips the oldest events rather than blocking the core; what it does
    /// observe stays in per-session order.
    pub async fn recv(&mut self) -> Option<(SessionId, Event)> {
        loop {
            match self.receiver.recv().await {
                Ok(tagged) => return Some(tagged),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
