//! Transport layer module for the EXOsocket protocol
//!
//! This crate provides the message-oriented transports the protocol runs on:
//! a WebSocket transport for real controllers and an in-memory transport
//! used to script a controller in tests.

pub mod memory;
pub mod stream;
pub mod websocket;

pub use exo_core::{ExoError, ExoResult};
pub use memory::{MemoryPeer, MemoryTransport, PeerEvent};
pub use stream::{Frame, FrameAccessor, TransportLayer};
pub use websocket::{
    EXOSOCKET_PATH, EXOSOCKET_SUBPROTOCOL, WebSocketSettings, WebSocketTransport,
};
