//! Session channel
//!
//! The channel owns the transport together with everything that belongs to
//! one connection: the state, the frame cipher once authenticated, the
//! granted session level and the controller identity.
//!
//! # Framing
//!
//! - before login: every message is a JSON text frame
//! - after login: every message is JSON inside an encrypted binary frame
//!
//! Frames that cannot be understood (non-JSON text, undecryptable binary,
//! binary before login) are logged and dropped. Identity frames update the
//! published identity whichever call happens to be receiving.

use crate::state::ConnectionState;
use exo_application::Message;
use exo_core::{ExoError, ExoResult, Identity, SessionLevel};
use exo_security::ChainedFrameCipher;
use exo_transport::{Frame, TransportLayer};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Message channel over one transport
#[derive(Debug)]
pub struct SessionChannel<T> {
    transport: T,
    state: ConnectionState,
    cipher: Option<ChainedFrameCipher>,
    session_level: Option<SessionLevel>,
    identity: watch::Sender<Identity>,
}

impl<T: TransportLayer> SessionChannel<T> {
    pub fn new(transport: T) -> Self {
        let (identity, _) = watch::channel(Identity::default());
        Self {
            transport,
            state: ConnectionState::Disconnected,
            cipher: None,
            session_level: None,
            identity,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to a new state
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Protocol` for a backward or skipping transition
    pub fn transition(&mut self, new_state: ConnectionState) -> ExoResult<()> {
        self.state.validate_transition(new_state)?;
        log::trace!("Session state {} -> {}", self.state.as_str(), new_state.as_str());
        self.state = new_state;
        Ok(())
    }

    /// Drop all per-connection state without touching the transport
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.cipher = None;
        self.session_level = None;
    }

    /// Check if the transport is open and the state agrees
    pub fn is_open(&self) -> bool {
        self.state.is_open() && !self.transport.is_closed()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the transport
    pub async fn open(&mut self) -> ExoResult<()> {
        if self.state.is_open() {
            self.mark_disconnected();
        }
        self.transport.open().await?;
        self.transition(ConnectionState::Connected)
    }

    /// Close the transport and forget per-connection state
    pub async fn close(&mut self) -> ExoResult<()> {
        self.mark_disconnected();
        self.transport.close().await
    }

    pub fn session_level(&self) -> Option<SessionLevel> {
        self.session_level
    }

    pub fn set_session_level(&mut self, level: Option<SessionLevel>) {
        self.session_level = level;
    }

    /// Get the last reported identity
    pub fn identity(&self) -> Identity {
        self.identity.borrow().clone()
    }

    /// Subscribe to identity changes
    pub fn subscribe_identity(&self) -> watch::Receiver<Identity> {
        self.identity.subscribe()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity.send_replace(identity);
    }

    /// Switch to encrypted traffic
    ///
    /// Both accumulators of the cipher must already be seeded.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Security` for an unseeded cipher and
    /// `ExoError::Protocol` unless the session is authenticating
    pub fn enable_encryption(&mut self, cipher: ChainedFrameCipher) -> ExoResult<()> {
        if !cipher.is_ready() {
            return Err(ExoError::Security(
                "Frame cipher accumulators not seeded".to_string(),
            ));
        }
        self.transition(ConnectionState::Authenticated)?;
        self.cipher = Some(cipher);
        Ok(())
    }

    /// Send a frame as is, bypassing message framing
    pub async fn send_raw(&mut self, frame: Frame) -> ExoResult<()> {
        let result = self.transport.send(frame).await;
        self.check(result)
    }

    /// Receive a frame as is, bypassing message framing
    pub async fn receive_raw(&mut self, timeout: Option<Duration>) -> ExoResult<Frame> {
        let result = self.transport.receive(timeout).await;
        self.check(result)
    }

    /// Send a message, encrypted when the session is authenticated
    pub async fn send(&mut self, message: &Message) -> ExoResult<()> {
        if !self.state.is_open() {
            return Err(ExoError::NotConnected);
        }
        let json = message.to_json()?;
        let frame = match (self.state.is_encrypted(), self.cipher.as_mut()) {
            (true, Some(cipher)) => Frame::Binary(cipher.encrypt(&json)?),
            (true, None) => {
                return Err(ExoError::Security("Frame cipher missing".to_string()));
            }
            (false, _) => Frame::Text(json),
        };
        log::trace!("Sending {} ({} bytes)", message.method(), frame.len());
        self.send_raw(frame).await
    }

    /// Receive the next frame and decode it
    ///
    /// # Returns
    ///
    /// `None` when the frame was dropped
    pub async fn receive(&mut self, timeout: Option<Duration>) -> ExoResult<Option<Message>> {
        if !self.state.is_open() {
            return Err(ExoError::NotConnected);
        }
        let frame = self.receive_raw(timeout).await?;
        let text = match (frame, self.cipher.as_mut()) {
            (Frame::Binary(data), Some(cipher)) if self.state.is_encrypted() => {
                match cipher.decrypt(&data) {
                    Ok(text) => text,
                    Err(e) => {
                        log::warn!("Failed to decrypt frame of {} bytes: {}", data.len(), e);
                        return Ok(None);
                    }
                }
            }
            (Frame::Binary(data), _) => {
                log::debug!("Ignoring binary frame of {} bytes (not authenticated)", data.len());
                return Ok(None);
            }
            (Frame::Text(text), _) if self.state.is_encrypted() => {
                log::warn!("Ignoring plain text frame of {} bytes after login", text.len());
                return Ok(None);
            }
            (Frame::Text(text), _) => text,
        };

        let message = match Message::from_json(&text) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Skipping undecodable message: {}", e);
                return Ok(None);
            }
        };

        if let Message::Identity { params } = &message {
            self.identity.send_replace(params.to_identity());
        }
        Ok(Some(message))
    }

    /// Wait for the next message with a given method
    ///
    /// Other messages received meanwhile are dropped after the generic
    /// receive path has absorbed them.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Timeout` if no such message arrives in time
    pub async fn await_method(&mut self, method: &str, timeout: Duration) -> ExoResult<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ExoError::Timeout(format!("waiting for {}", method)));
            }
            let message = match self.receive(Some(remaining)).await {
                Ok(message) => message,
                Err(ExoError::Timeout(_)) => {
                    return Err(ExoError::Timeout(format!("waiting for {}", method)));
                }
                Err(e) => return Err(e),
            };
            match message {
                Some(message) if message.method() == method => return Ok(message),
                Some(message) => {
                    log::debug!("Ignoring {} while waiting for {}", message.method(), method);
                }
                None => {}
            }
        }
    }

    fn check<R>(&mut self, result: ExoResult<R>) -> ExoResult<R> {
        if let Err(e) = &result {
            if e.is_connection_lost() {
                self.mark_disconnected();
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use exo_security::ChainedFrameCipher;
    use exo_transport::{MemoryPeer, MemoryTransport};
    use serde_json::json;
    use tokio_test::assert_ok;

    pub(crate) const KEY: [u8; 16] = [7; 16];
    pub(crate) const CLIENT_SEED: [u8; 16] = [0x11; 16];
    pub(crate) const SERVER_SEED: [u8; 16] = [0x22; 16];

    /// Open channel in the Identified state
    pub(crate) async fn identified() -> (SessionChannel<MemoryTransport>, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair();
        let mut channel = SessionChannel::new(transport);
        channel.open().await.unwrap();
        channel.transition(ConnectionState::Identified).unwrap();
        (channel, peer)
    }

    /// Open channel in the Authenticated state, with the matching peer cipher
    pub(crate) async fn authenticated() -> (SessionChannel<MemoryTransport>, MemoryPeer, ChainedFrameCipher) {
        let (mut channel, peer) = identified().await;
        channel.transition(ConnectionState::Authenticating).unwrap();

        let mut cipher = ChainedFrameCipher::from_key(&KEY);
        cipher.set_send_accumulator(CLIENT_SEED);
        cipher.set_receive_accumulator(&SERVER_SEED).unwrap();
        channel.enable_encryption(cipher).unwrap();

        let mut peer_cipher = ChainedFrameCipher::from_key(&KEY);
        peer_cipher.set_send_accumulator(SERVER_SEED);
        peer_cipher.set_receive_accumulator(&CLIENT_SEED).unwrap();
        (channel, peer, peer_cipher)
    }

    #[tokio::test]
    async fn test_plain_send() {
        let (mut channel, mut peer) = identified().await;
        assert_ok!(channel.send(&Message::ping()).await);
        match peer.recv_frame().await {
            Some(Frame::Text(text)) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value, json!({"method": "ping"}));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_absorbs_identity() {
        let (mut channel, peer) = identified().await;
        let mut identity = channel.subscribe_identity();
        peer.send_text(r#"{"method":"identity","params":{"controllerName":"HS-2","serial":"17"}}"#)
            .unwrap();

        let message = assert_ok!(channel.receive(Some(Duration::from_secs(1))).await);
        assert_eq!(message.map(|m| m.method().to_string()), Some("identity".to_string()));
        assert!(identity.has_changed().unwrap());
        assert_eq!(identity.borrow_and_update().controller_name.as_deref(), Some("HS-2"));
        assert_eq!(channel.identity().serial.as_deref(), Some("17"));
    }

    #[tokio::test]
    async fn test_receive_drops_garbage() {
        let (mut channel, peer) = identified().await;
        peer.send_text("hello").unwrap();
        peer.send_binary(vec![0; 16]).unwrap();
        assert!(channel.receive(None).await.unwrap().is_none());
        assert!(channel.receive(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_await_method_skips_others() {
        let (mut channel, peer) = identified().await;
        peer.send_text(r#"{"method":"pingAck"}"#).unwrap();
        peer.send_text(r#"{"method":"identity","params":{"projectName":"Plant"}}"#)
            .unwrap();
        peer.send_text(r#"{"method":"versionAck"}"#).unwrap();

        let message = channel
            .await_method("versionAck", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(message.method(), "versionAck");
        assert_eq!(channel.identity().project_name.as_deref(), Some("Plant"));
    }

    #[tokio::test]
    async fn test_await_method_timeout() {
        let (mut channel, peer) = identified().await;
        peer.send_text(r#"{"method":"pingAck"}"#).unwrap();
        let err = channel
            .await_method("versionAck", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_encrypted_exchange() {
        let (mut channel, mut peer, mut peer_cipher) = authenticated().await;
        assert_eq!(channel.state(), ConnectionState::Authenticated);

        channel.send(&Message::ping()).await.unwrap();
        match peer.recv_frame().await {
            Some(Frame::Binary(data)) => {
                assert_eq!(peer_cipher.decrypt(&data).unwrap(), r#"{"method":"ping"}"#);
            }
            other => panic!("unexpected frame {:?}", other),
        }

        let frame = peer_cipher
            .encrypt(r#"{"method":"sessionLevel","params":{"sessionLevel":3}}"#)
            .unwrap();
        peer.send_binary(frame).unwrap();
        let message = channel
            .await_method("sessionLevel", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(message, Message::SessionLevel { .. }));
    }

    #[tokio::test]
    async fn test_plain_text_ignored_after_login() {
        let (mut channel, peer, _) = authenticated().await;
        peer.send_text(r#"{"method":"pingAck"}"#).unwrap();
        assert!(channel.receive(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connection_loss_disconnects() {
        let (mut channel, peer, _) = authenticated().await;
        peer.close();
        let err = channel.receive(None).await.unwrap_err();
        assert!(err.is_connection_lost());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.send(&Message::ping()).await.is_err());
    }

    #[tokio::test]
    async fn test_enable_encryption_requires_seeds() {
        let (mut channel, _peer) = identified().await;
        channel.transition(ConnectionState::Authenticating).unwrap();
        let cipher = ChainedFrameCipher::from_key(&KEY);
        assert!(channel.enable_encryption(cipher).is_err());
        assert_eq!(channel.state(), ConnectionState::Authenticating);
    }
}
