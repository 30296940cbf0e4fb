use crate::core::event::DisconnectReason;
use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::error::{OpenError, SendError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client transport; owns one upgraded stream.
///
/// Payloads go out as binary frames; inbound text and binary frames both
/// surface as raw bytes, leaving interpretation to the session's codec.
pub struct WebSocketTransport {
    sink: SplitSink<WsStream, Message>,
    rx_task: JoinHandle<()>,
    closed: bool,
    url: String,
}

impl WebSocketTransport {
    pub(crate) async fn open(
        url: &str,
        subprotocol: Option<&str>,
        connect_timeout: Option<Duration>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, OpenError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| OpenError::HandshakeFailed(format!("{url}: {e}")))?;
        if let Some(proto) = subprotocol {
            let value = HeaderValue::from_str(proto)
                .map_err(|_| OpenError::HandshakeFailed(format!("invalid subprotocol: {proto}")))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", value);
        }

        let connect = tokio_tungstenite::connect_async(request);
        let (stream, _response) = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| OpenError::Timeout)?,
            None => connect.await,
        }
        .map_err(|e| map_handshake_error(e, url))?;
        info!("WebSocket connection established to {}", url);

        let (sink, stream) = stream.split();
        let rx_task = tokio::spawn(receive_loop(stream, events));

        Ok(Self {
            sink,
            rx_task,
            closed: false,
            url: url.to_string(),
        })
    }
}

fn map_handshake_error(err: tungstenite::Error, url: &str) -> OpenError {
    match err {
        tungstenite::Error::Io(io) => OpenError::from_io(io, url),
        other => OpenError::HandshakeFailed(format!("{url}: {other}")),
    }
}

async fn receive_loop(mut stream: SplitStream<WsStream>, events: mpsc::Sender<TransportEvent>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                debug!("received {} byte binary frame", data.len());
                if events.send(TransportEvent::Data(data)).await.is_err() {
                    return;
                }
            }
            Ok(Message::Text(text)) => {
                debug!("received {} byte text frame", text.len());
                if events
                    .send(TransportEvent::Data(text.into_bytes()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
            Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed) => {
                let _ = events
                    .send(TransportEvent::Closed(DisconnectReason::PeerClosed))
                    .await;
                return;
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Fault(e.to_string())).await;
                return;
            }
        }
    }
    let _ = events
        .send(TransportEvent::Closed(DisconnectReason::PeerClosed))
        .await;
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::NotConnected);
        }
        self.sink
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| SendError::PeerUnreachable(e.to_string()))?;
        debug!("sent {} byte binary frame", data.len());
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!("WebSocket close frame to {} not sent: {}", self.url, e);
        }
        if let Err(e) = self.sink.close().await {
            debug!("WebSocket sink close on {} returned: {}", self.url, e);
        }
        self.rx_task.abort();
        info!("WebSocket transport to {} closed", self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn events_channel() -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
        mpsc::channel(16)
    }

    async fn spawn_echo_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                if let Ok(ws) = tokio_tungstenite::accept_async(socket).await {
                    let (mut sink, mut stream) = ws.split();
                    while let Some(Ok(message)) = stream.next().await {
                        match message {
                            Message::Binary(_) | Message::Text(_) => {
                                if sink.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                }
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let (events, _rx) = events_channel();
        let result = WebSocketTransport::open("not a url", None, None, events).await;
        assert!(matches!(result, Err(OpenError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (events, _rx) = events_channel();
        let result =
            WebSocketTransport::open(&format!("ws://127.0.0.1:{port}"), None, None, events).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_timeout_to_unroutable_host() {
        let (events, _rx) = events_channel();
        let result = WebSocketTransport::open(
            "ws://192.0.2.1:9001",
            None,
            Some(Duration::from_millis(100)),
            events,
        )
        .await;
        assert!(matches!(result, Err(OpenError::Timeout)));
    }

    #[tokio::test]
    async fn test_binary_echo_round_trip() {
        let addr = spawn_echo_server().await;
        let (events, mut rx) = events_channel();

        let mut transport = WebSocketTransport::open(
            &format!("ws://{addr}"),
            Some("commlink"),
            Some(Duration::from_secs(2)),
            events,
        )
        .await
        .unwrap();

        transport.send(b"frame-1").await.unwrap();

        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for echo")
            .expect("channel closed");
        match event {
            TransportEvent::Data(bytes) => assert_eq!(bytes, b"frame-1"),
            other => panic!("expected data, got {other:?}"),
        }

        transport.close().await;
        transport.close().await;
        assert!(matches!(
            transport.send(b"late").await,
            Err(SendError::NotConnected)
        ));
    }
}
