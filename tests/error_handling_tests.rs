use commlink::{
    CodecConfig, CommLinkError, CommLinkResult, ConnectionState, CoreConfig, ErrorKind, Event,
    OpenError, SendError, SessionManager, TransportDescriptor,
};
use std::error::Error;
use std::time::Duration;
use tokio::time::timeout;

/// Error handling and resilience tests.
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let errors = vec![
            CommLinkError::Open(OpenError::Timeout),
            CommLinkError::Open(OpenError::DeviceNotFound("/dev/ttyUSB9".to_string())),
            CommLinkError::Send(SendError::NotConnected),
            CommLinkError::Send(SendError::PeerUnreachable("10.0.0.1:1".to_string())),
            CommLinkError::Session {
                message: "unknown session".to_string(),
            },
        ];

        for error in errors {
            // All errors should display properly.
            let display = error.to_string();
            assert!(!display.is_empty(), "Error display should not be empty");

            // Source chains are optional but must not panic.
            let _ = error.source();

            // All errors should be Send + Sync for async compatibility.
            fn assert_send_sync<T: Send + Sync>() {}
            assert_send_sync::<CommLinkError>();
        }
    }

    #[test]
    fn test_result_type() {
        fn success_function() -> CommLinkResult<String> {
            Ok("success".to_string())
        }

        fn error_function() -> CommLinkResult<String> {
            Err(CommLinkError::Session {
                message: "test error".to_string(),
            })
        }

        assert!(success_function().is_ok());
        assert!(error_function().is_err());
    }

    #[tokio::test]
    async fn test_tcp_connect_timeout_yields_failed_state() {
        let manager = SessionManager::new(CoreConfig::default());
        let mut events = manager.subscribe();

        // TEST-NET-1 (RFC 5737) is not routable, so the connect hangs until
        // the caller-supplied timeout fires.
        let id = manager
            .create_session(
                TransportDescriptor::Tcp {
                    host: "192.0.2.1".to_string(),
                    port: 12345,
                    connect_timeout_ms: Some(200),
                },
                CodecConfig::default(),
            )
            .await
            .unwrap();

        loop {
            let (session, event) = timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for failure event")
                .expect("event stream closed");
            if session == id {
                match event {
                    Event::Error { kind, detail } => {
                        assert_eq!(kind, ErrorKind::TransportFault);
                        assert!(detail.contains("timed out"));
                        break;
                    }
                    other => panic!("unexpected event before failure: {other:?}"),
                }
            }
        }

        let state = manager.session_state(id).await.unwrap();
        match state {
            ConnectionState::Failed(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected Failed state, got {other}"),
        }

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_before_connect_fails_with_not_connected() {
        let manager = SessionManager::new(CoreConfig::default());

        // The connect to a non-routable host is still pending.
        let id = manager
            .create_session(
                TransportDescriptor::Tcp {
                    host: "192.0.2.1".to_string(),
                    port: 12345,
                    connect_timeout_ms: Some(1000),
                },
                CodecConfig::default(),
            )
            .await
            .unwrap();

        let result = manager.send(id, "too early").await;
        assert!(matches!(
            result,
            Err(CommLinkError::Send(SendError::NotConnected))
        ));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_operations_on_unknown_session() {
        let manager = SessionManager::new(CoreConfig::default());
        let mut events = manager.subscribe();

        let stale = {
            let id = manager
                .create_session(
                    TransportDescriptor::Udp {
                        host: "127.0.0.1".to_string(),
                        port: 49_140,
                        local_port: None,
                    },
                    CodecConfig::default(),
                )
                .await
                .unwrap();
            loop {
                let (session, event) = timeout(Duration::from_secs(5), events.recv())
                    .await
                    .expect("timed out")
                    .expect("stream closed");
                if session == id && matches!(event, Event::Connected) {
                    break;
                }
            }
            manager.close_session(id).await.unwrap();
            id
        };

        // The id is gone and will never be reused.
        assert!(manager.session_state(stale).await.is_none());
        let result = manager.send(stale, "late").await;
        assert!(matches!(result, Err(CommLinkError::Session { .. })));

        // Close paths are idempotent and never raise on a second call.
        manager.close_session(stale).await.unwrap();
        manager.close_session(stale).await.unwrap();

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_hex_payload_keeps_session_alive() {
        let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let manager = SessionManager::new(CoreConfig::default());
        let mut events = manager.subscribe();

        let id = manager
            .create_session(
                TransportDescriptor::Udp {
                    host: "127.0.0.1".to_string(),
                    port: peer_addr.port(),
                    local_port: None,
                },
                CodecConfig::new(commlink::CodecMode::Hex),
            )
            .await
            .unwrap();
        loop {
            let (session, event) = timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out")
                .expect("stream closed");
            if session == id && matches!(event, Event::Connected) {
                break;
            }
        }

        // Odd digit count is a codec error, recovered locally.
        manager.send(id, "abc").await.unwrap();

        loop {
            let (session, event) = timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out")
                .expect("stream closed");
            if session != id {
                continue;
            }
            match event {
                Event::Error { kind, .. } => {
                    assert_eq!(kind, ErrorKind::InvalidEncoding);
                    break;
                }
                Event::DataSent { .. } => panic!("invalid payload must not be sent"),
                _ => {}
            }
        }

        // The session is still connected and usable.
        let state = manager.session_state(id).await.unwrap();
        assert!(state.is_connected());
        manager.send(id, "abcd").await.unwrap();

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let manager = SessionManager::new(CoreConfig::default());
        manager.shutdown().await;
        manager.shutdown().await;

        let result = manager
            .create_session(
                TransportDescriptor::Udp {
                    host: "127.0.0.1".to_string(),
                    port: 49_141,
                    local_port: None,
                },
                CodecConfig::default(),
            )
            .await;
        assert!(matches!(result, Err(CommLinkError::Session { .. })));
    }
}
