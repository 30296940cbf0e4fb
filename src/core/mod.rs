// Core module - Codec, framing, transport abstraction and sessions
pub mod codec;
pub mod event;
pub mod frame;
pub mod session;
pub mod transport;
