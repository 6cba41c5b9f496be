//! EXOsocket client
//!
//! One client owns one connection. Every operation locks the client for its
//! whole request/answer sequence, so only one logical call drives the socket
//! at a time. Identity pushes are absorbed by whichever call is receiving and
//! published through a watch channel that needs no lock.
//!
//! # Lifecycle
//!
//! ```text
//! connect:  open -> versionOffer/Ack -> identity -> [login] -> ready
//! failure:  any step fails -> close, state Disconnected
//! loss:     transport error during a call -> state Disconnected,
//!           ensure_connected() runs the whole sequence again
//! ```

use super::config::ClientConfig;
use super::connection::Connection;
use super::handshake::perform_handshake;
use super::login::perform_login;
use exo_application::{
    ContextAllocator, ContextKind, ErrorTranslator, Message, PendingRequests, ReadResult,
    ReadService, WriteOutcome, WriteService,
};
use exo_core::{ExoError, ExoResult, Identity, PointAddress, PointValue, SessionLevel};
use exo_security::Credentials;
use exo_session::{ConnectionState, SessionChannel};
use exo_transport::{TransportLayer, WebSocketTransport};
use std::collections::BTreeMap;
use tokio::sync::{Mutex, watch};

/// Everything one logical call works on
#[derive(Debug)]
struct ClientInner<T> {
    channel: SessionChannel<T>,
    contexts: ContextAllocator,
    reads: ReadService,
    writes: WriteService,
    translator: ErrorTranslator,
    config: ClientConfig,
}

/// EXOsocket client over a transport
#[derive(Debug)]
pub struct ExoClient<T> {
    inner: Mutex<ClientInner<T>>,
    identity: watch::Receiver<Identity>,
}

impl ExoClient<WebSocketTransport> {
    /// Create a WebSocket client from a configuration
    ///
    /// # Errors
    ///
    /// Returns `ExoError::InvalidData` if neither a host nor a URL is set
    pub fn from_config(config: ClientConfig) -> ExoResult<Self> {
        let transport = WebSocketTransport::new(config.websocket_settings()?);
        Self::new(transport, config)
    }
}

impl<T: TransportLayer> ExoClient<T> {
    /// Create a client over any transport
    pub fn new(transport: T, config: ClientConfig) -> ExoResult<Self> {
        let translator = ErrorTranslator::new(config.error_code_source()?);
        let channel = SessionChannel::new(transport);
        let identity = channel.subscribe_identity();
        Ok(Self {
            inner: Mutex::new(ClientInner {
                channel,
                contexts: ContextAllocator::new(),
                reads: ReadService::new(config.batch),
                writes: WriteService::new(),
                translator,
                config,
            }),
            identity,
        })
    }

    /// Connect, run the handshake and log in when credentials are set
    ///
    /// Does nothing if the connection is already up. On failure the
    /// transport is closed again and the error returned.
    pub async fn connect(&self) -> ExoResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.is_connected() {
            return Ok(());
        }
        inner.establish().await
    }

    /// Close the connection
    pub async fn close(&self) -> ExoResult<()> {
        let mut inner = self.inner.lock().await;
        let was_open = inner.channel.state().is_open();
        inner.channel.close().await?;
        if was_open {
            log::info!("Connection closed");
        }
        Ok(())
    }

    /// Reconnect from scratch if the connection has been lost
    pub async fn ensure_connected(&self) -> ExoResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.is_connected() {
            return Ok(());
        }
        if inner.channel.state().is_open() {
            log::info!(
                "Connection not usable in state {}, reconnecting",
                inner.channel.state().as_str()
            );
        }
        inner.establish().await
    }

    /// Log in on an identified connection
    ///
    /// The credentials are kept for later reconnects. A failed login closes
    /// the connection.
    pub async fn login(&self, username: &str, password: &str) -> ExoResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.channel.state() != ConnectionState::Identified || !inner.channel.is_open() {
            return Err(ExoError::NotConnected);
        }
        let credentials = Credentials::new(username, password);
        inner.config.credentials = Some(credentials.clone());
        inner.login(&credentials).await
    }

    /// Send a ping and wait for the answer
    pub async fn ping(&self) -> ExoResult<()> {
        let mut inner = self.inner.lock().await;
        inner.require_ready()?;
        let timeout = inner.config.handshake_timeout;
        inner.channel.send(&Message::ping()).await?;
        inner.channel.await_method("pingAck", timeout).await?;
        Ok(())
    }

    /// Read points, keeping only values
    ///
    /// Malformed addresses are skipped. Points with a device error map to
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Timeout` unless every chunk is answered within the
    /// read deadline
    pub async fn read_points<S: AsRef<str> + Sync>(
        &self,
        addresses: &[S],
    ) -> ExoResult<BTreeMap<PointAddress, Option<PointValue>>> {
        Ok(self.read_points_with_errors(addresses).await?.into_values())
    }

    /// Read points with their device errors
    pub async fn read_points_with_errors<S: AsRef<str> + Sync>(
        &self,
        addresses: &[S],
    ) -> ExoResult<ReadResult> {
        let mut inner = self.inner.lock().await;
        inner.read(ContextKind::Peek, addresses).await
    }

    /// Read one point
    ///
    /// # Errors
    ///
    /// Returns `ExoError::InvalidAddress` for a malformed address
    pub async fn read_point(&self, address: &str) -> ExoResult<Option<PointValue>> {
        let parsed = PointAddress::from_string(address)?;
        let result = self.read_points_with_errors(&[address]).await?;
        Ok(result.value(&parsed).cloned())
    }

    /// Read points as a long-poll subscription
    ///
    /// Same as `read_points_with_errors`, with correlation ids drawn from
    /// the advise range.
    pub async fn add_advise<S: AsRef<str> + Sync>(&self, addresses: &[S]) -> ExoResult<ReadResult> {
        let mut inner = self.inner.lock().await;
        inner.read(ContextKind::Advise, addresses).await
    }

    /// Write one point
    ///
    /// # Returns
    ///
    /// `true` if the controller accepted the value. A malformed address, an
    /// insufficient session level, a device error and a missed write
    /// deadline are all `false`.
    pub async fn write_point(&self, address: &str, value: impl Into<PointValue>) -> ExoResult<bool> {
        match self.write_point_with_outcome(address, value).await {
            Ok(outcome) => Ok(outcome.is_success()),
            Err(e @ (ExoError::InvalidAddress(_) | ExoError::AccessDenied(_))) => {
                log::error!("Write to {} rejected: {}", address, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Write one point and report how it went
    ///
    /// # Errors
    ///
    /// Returns `ExoError::InvalidAddress` or `ExoError::AccessDenied` before
    /// anything is sent, and connection-level errors
    pub async fn write_point_with_outcome(
        &self,
        address: &str,
        value: impl Into<PointValue>,
    ) -> ExoResult<WriteOutcome> {
        let mut inner = self.inner.lock().await;
        inner.write(address, value.into()).await
    }

    /// Get the last reported controller identity
    pub fn identity(&self) -> Identity {
        self.identity.borrow().clone()
    }

    /// Subscribe to identity changes, including spontaneous pushes
    pub fn subscribe_identity(&self) -> watch::Receiver<Identity> {
        self.identity.clone()
    }

    /// Get the session level granted at login
    pub async fn session_level(&self) -> Option<SessionLevel> {
        self.inner.lock().await.channel.session_level()
    }

    /// Get the connection state
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.channel.state()
    }

    /// Check if the connection is up and ready for reads and writes
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_connected()
    }
}

impl<T: TransportLayer> ClientInner<T> {
    fn is_connected(&self) -> bool {
        if !self.channel.is_open() {
            return false;
        }
        match self.channel.state() {
            ConnectionState::Authenticated => true,
            ConnectionState::Identified => !self.config.has_credentials(),
            _ => false,
        }
    }

    fn require_ready(&self) -> ExoResult<()> {
        if self.channel.is_open() && self.channel.state().is_ready() {
            Ok(())
        } else {
            Err(ExoError::NotConnected)
        }
    }

    /// Run the whole connect sequence from a clean state
    async fn establish(&mut self) -> ExoResult<()> {
        self.contexts = ContextAllocator::new();
        self.translator.reset();

        let result = self.open_and_identify().await;
        if let Err(e) = &result {
            log::error!("Connect failed: {}", e);
            if let Err(close_error) = self.channel.close().await {
                log::debug!("Close after failed connect: {}", close_error);
            }
        }
        result
    }

    async fn open_and_identify(&mut self) -> ExoResult<()> {
        self.channel.open().await?;
        perform_handshake(&mut self.channel, &self.config).await?;
        match self.config.credentials.clone() {
            Some(credentials) if !credentials.is_empty() => {
                perform_login(&mut self.channel, &credentials, self.config.handshake_timeout).await?;
            }
            _ => log::info!("No credentials configured, session stays unauthenticated"),
        }
        Ok(())
    }

    async fn login(&mut self, credentials: &Credentials) -> ExoResult<()> {
        let result = perform_login(&mut self.channel, credentials, self.config.handshake_timeout).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Err(close_error) = self.channel.close().await {
                    log::debug!("Close after failed login: {}", close_error);
                }
                Err(e)
            }
        }
    }

    async fn read<S: AsRef<str>>(&mut self, kind: ContextKind, addresses: &[S]) -> ExoResult<ReadResult> {
        self.require_ready()?;
        let requests = self.reads.prepare(&mut self.contexts, kind, addresses);
        if requests.is_empty() {
            log::debug!("No valid addresses to read");
            return Ok(ReadResult::new());
        }
        self.translator.ensure_loaded().await;

        let mut pending = PendingRequests::new(
            requests.iter().map(|(context, _)| *context),
            self.config.read_timeout,
        );
        self.channel.send_all(&requests).await?;
        self.channel.await_updates(&mut pending).await.map_err(|e| {
            if e.is_timeout() {
                log::error!("Read timeout: {}", e);
            }
            e
        })?;

        let updates = pending.into_results().into_iter().map(|(_, update)| update);
        Ok(self.reads.collect(updates, &self.translator))
    }

    async fn write(&mut self, address: &str, value: PointValue) -> ExoResult<WriteOutcome> {
        let level = self.channel.session_level();
        let (address, context, message) =
            self.writes.prepare(&mut self.contexts, level, address, value)?;
        self.require_ready()?;
        self.translator.ensure_loaded().await;

        let mut pending = PendingRequests::new([context], self.config.write_timeout);
        self.channel.send(&message).await?;
        let update = match self.channel.await_updates(&mut pending).await {
            Ok(()) => pending.into_results().into_iter().next().map(|(_, update)| update),
            Err(e) if e.is_timeout() => None,
            Err(e) => return Err(e),
        };
        Ok(self.writes.evaluate(&address, update.as_ref(), &self.translator))
    }
}

#[async_trait::async_trait]
impl<T: TransportLayer + 'static> Connection for ExoClient<T> {
    async fn connect(&self) -> ExoResult<()> {
        ExoClient::connect(self).await
    }

    async fn close(&self) -> ExoResult<()> {
        ExoClient::close(self).await
    }

    async fn ensure_connected(&self) -> ExoResult<()> {
        ExoClient::ensure_connected(self).await
    }

    async fn read_points(
        &self,
        addresses: &[String],
    ) -> ExoResult<BTreeMap<PointAddress, Option<PointValue>>> {
        ExoClient::read_points(self, addresses).await
    }

    async fn read_points_with_errors(&self, addresses: &[String]) -> ExoResult<ReadResult> {
        ExoClient::read_points_with_errors(self, addresses).await
    }

    async fn write_point(&self, address: &str, value: PointValue) -> ExoResult<bool> {
        ExoClient::write_point(self, address, value).await
    }

    fn identity(&self) -> Identity {
        ExoClient::identity(self)
    }
}
