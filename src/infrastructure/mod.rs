// Infrastructure module - OS-backed transport implementations
pub mod logging;
pub mod serial;
pub mod tcp;
pub mod udp;
pub mod websocket;

pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;
pub use websocket::WebSocketTransport;
