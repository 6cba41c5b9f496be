//! In-memory transport implementation
//!
//! `MemoryTransport::pair` returns a transport and the peer end of the same
//! channel. Code under test drives the transport exactly like a WebSocket,
//! while the test scripts the controller side through `MemoryPeer`.

use crate::stream::{Frame, FrameAccessor, TransportLayer};
use async_trait::async_trait;
use exo_core::{ExoError, ExoResult};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Event travelling across an in-memory channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Frame(Frame),
    Close,
}

/// Client end of an in-memory channel
#[derive(Debug)]
pub struct MemoryTransport {
    outbound: UnboundedSender<PeerEvent>,
    inbound: UnboundedReceiver<PeerEvent>,
    closed: bool,
}

/// Controller end of an in-memory channel
#[derive(Debug)]
pub struct MemoryPeer {
    outbound: UnboundedSender<PeerEvent>,
    inbound: UnboundedReceiver<PeerEvent>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (to_peer, from_transport) = unbounded_channel();
        let (to_transport, from_peer) = unbounded_channel();
        (
            MemoryTransport {
                outbound: to_peer,
                inbound: from_peer,
                closed: true,
            },
            MemoryPeer {
                outbound: to_transport,
                inbound: from_transport,
            },
        )
    }
}

#[async_trait]
impl TransportLayer for MemoryTransport {
    async fn open(&mut self) -> ExoResult<()> {
        if self.outbound.is_closed() {
            return Err(ExoError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "In-memory peer has gone away",
            )));
        }
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl FrameAccessor for MemoryTransport {
    async fn send(&mut self, frame: Frame) -> ExoResult<()> {
        if self.closed {
            return Err(ExoError::NotConnected);
        }
        if self.outbound.send(PeerEvent::Frame(frame)).is_err() {
            self.closed = true;
            return Err(ExoError::Transport("In-memory peer has gone away".to_string()));
        }
        Ok(())
    }

    async fn receive(&mut self, timeout: Option<Duration>) -> ExoResult<Frame> {
        if self.closed {
            return Err(ExoError::NotConnected);
        }
        let event = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.inbound.recv())
                .await
                .map_err(|_| ExoError::Timeout("waiting for in-memory frame".to_string()))?,
            None => self.inbound.recv().await,
        };
        match event {
            Some(PeerEvent::Frame(frame)) => Ok(frame),
            Some(PeerEvent::Close) => {
                self.closed = true;
                Err(ExoError::ConnectionClosed("close frame".to_string()))
            }
            None => {
                self.closed = true;
                Err(ExoError::ConnectionClosed("peer dropped".to_string()))
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> ExoResult<()> {
        if !self.closed {
            let _ = self.outbound.send(PeerEvent::Close);
        }
        self.closed = true;
        Ok(())
    }
}

impl MemoryPeer {
    /// Send a frame to the transport
    pub fn send(&self, frame: Frame) -> ExoResult<()> {
        self.outbound
            .send(PeerEvent::Frame(frame))
            .map_err(|_| ExoError::ConnectionClosed("transport dropped".to_string()))
    }

    /// Send a text frame to the transport
    pub fn send_text(&self, text: impl Into<String>) -> ExoResult<()> {
        self.send(Frame::Text(text.into()))
    }

    /// Send a binary frame to the transport
    pub fn send_binary(&self, data: Vec<u8>) -> ExoResult<()> {
        self.send(Frame::Binary(data))
    }

    /// Send a close frame to the transport
    pub fn close(&self) {
        let _ = self.outbound.send(PeerEvent::Close);
    }

    /// Wait for the next event sent by the transport
    ///
    /// Returns `None` once the transport has been dropped.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.inbound.recv().await
    }

    /// Wait for the next frame, treating a close as the end of the stream
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        match self.inbound.recv().await {
            Some(PeerEvent::Frame(frame)) => Some(frame),
            Some(PeerEvent::Close) | None => None,
        }
    }

    /// Take an already delivered event without waiting
    pub fn try_recv(&mut self) -> Option<PeerEvent> {
        self.inbound.try_recv().ok()
    }
}
