//! Frame accessor trait for transport layer

use async_trait::async_trait;
use exo_core::ExoResult;
use std::time::Duration;

/// A data frame exchanged with the controller
///
/// Control frames (ping, pong) never surface here; close and error frames
/// are reported as `ExoError::ConnectionClosed` by `FrameAccessor::receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame, carrying JSON before authentication
    Text(String),
    /// Binary frame, carrying chaining seeds and encrypted JSON
    Binary(Vec<u8>),
}

impl Frame {
    /// Get the payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a short name of the frame kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
        }
    }
}

/// Frame accessor interface to exchange whole frames with a remote controller
#[async_trait]
pub trait FrameAccessor: Send + Sync {
    /// Send one frame
    async fn send(&mut self, frame: Frame) -> ExoResult<()>;

    /// Receive the next data frame
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum time to wait. None blocks until a frame arrives
    ///   or the connection closes.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Timeout` when the wait expires and
    /// `ExoError::ConnectionClosed` on a close frame, a transport error or a
    /// vanished peer.
    async fn receive(&mut self, timeout: Option<Duration>) -> ExoResult<Frame>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Close the connection
    ///
    /// Closing an already closed transport is a no-op.
    async fn close(&mut self) -> ExoResult<()>;
}

/// Transport layer trait that extends FrameAccessor
#[async_trait]
pub trait TransportLayer: FrameAccessor {
    /// Open the connection
    ///
    /// Opening an already open transport is a no-op.
    async fn open(&mut self) -> ExoResult<()>;
}
