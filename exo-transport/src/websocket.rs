//! WebSocket transport implementation

use crate::stream::{Frame, FrameAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::Bytes;
use exo_core::{ExoError, ExoResult};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

/// Path of the EXOsocket endpoint on the controller's web server
pub const EXOSOCKET_PATH: &str = "/_EXOsocket/";

/// Subprotocol token offered during the WebSocket upgrade
pub const EXOSOCKET_SUBPROTOCOL: &str = "EXOsocket";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Wrapper for the WebSocket stream that implements Debug
struct DebugWebSocket(WsStream);

impl fmt::Debug for DebugWebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketStream").finish()
    }
}

impl Deref for DebugWebSocket {
    type Target = WsStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugWebSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// WebSocket transport layer settings
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    pub url: Url,
    pub subprotocol: String,
    pub connect_timeout: Option<Duration>,
    pub keepalive_interval: Option<Duration>,
}

impl WebSocketSettings {
    /// Create new WebSocket settings
    pub fn new(url: Url) -> Self {
        Self {
            url,
            subprotocol: EXOSOCKET_SUBPROTOCOL.to_string(),
            connect_timeout: Some(Duration::from_secs(10)),
            keepalive_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Create settings for the EXOsocket endpoint of a controller
    ///
    /// # Arguments
    ///
    /// * `host` - Host name or address, optionally with a port (`"10.0.0.2:8080"`)
    pub fn for_host(host: &str) -> ExoResult<Self> {
        let url = Url::parse(&format!("ws://{}{}", host, EXOSOCKET_PATH))
            .map_err(|e| ExoError::InvalidData(format!("Invalid WebSocket URL: {}", e)))?;
        Ok(Self::new(url))
    }
}

/// WebSocket transport layer implementation
///
/// Keepalive pings are sent while a `receive` call is waiting. A peer that
/// sends nothing within half the keepalive interval after a ping is treated
/// as gone and the transport closes.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: Option<DebugWebSocket>,
    settings: WebSocketSettings,
    keepalive: Option<Interval>,
    pong_deadline: Option<Instant>,
    closed: bool,
}

enum Event {
    Message(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Keepalive,
    PongMissed,
    Deadline,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport layer
    pub fn new(settings: WebSocketSettings) -> Self {
        Self {
            stream: None,
            settings,
            keepalive: None,
            pong_deadline: None,
            closed: true,
        }
    }

    /// Create a WebSocket transport for a controller host
    pub fn for_host(host: &str) -> ExoResult<Self> {
        Ok(Self::new(WebSocketSettings::for_host(host)?))
    }

    /// Get the settings
    pub fn settings(&self) -> &WebSocketSettings {
        &self.settings
    }

    fn mark_closed(&mut self) {
        self.stream = None;
        self.keepalive = None;
        self.pong_deadline = None;
        self.closed = true;
    }

    async fn send_message(&mut self, message: Message) -> ExoResult<()> {
        let stream = self.stream.as_mut().ok_or(ExoError::NotConnected)?;
        if let Err(e) = stream.send(message).await {
            self.mark_closed();
            return Err(ExoError::Transport(format!("WebSocket send failed: {}", e)));
        }
        Ok(())
    }
}

async fn keepalive_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn deadline_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[async_trait]
impl TransportLayer for WebSocketTransport {
    async fn open(&mut self) -> ExoResult<()> {
        if !self.closed {
            return Ok(());
        }

        let mut request = self
            .settings
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ExoError::Transport(format!("Invalid WebSocket request: {}", e)))?;
        let protocol = HeaderValue::from_str(&self.settings.subprotocol)
            .map_err(|e| ExoError::InvalidData(format!("Invalid subprotocol: {}", e)))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);

        let connect = connect_async(request);
        let result = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| ExoError::Timeout(format!("connecting to {}", self.settings.url)))?
        } else {
            connect.await
        };
        let (stream, response) = result
            .map_err(|e| ExoError::Transport(format!("WebSocket connect failed: {}", e)))?;
        log::debug!(
            "WebSocket upgrade to {} answered with {}",
            self.settings.url,
            response.status()
        );

        self.keepalive = self.settings.keepalive_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.stream = Some(DebugWebSocket(stream));
        self.pong_deadline = None;
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl FrameAccessor for WebSocketTransport {
    async fn send(&mut self, frame: Frame) -> ExoResult<()> {
        log::trace!("Sending {} frame ({} bytes)", frame.kind(), frame.len());
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data.into()),
        };
        self.send_message(message).await
    }

    async fn receive(&mut self, timeout: Option<Duration>) -> ExoResult<Frame> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let stream = self.stream.as_mut().ok_or(ExoError::NotConnected)?;
            let event = tokio::select! {
                message = stream.next() => Event::Message(message),
                _ = keepalive_tick(&mut self.keepalive) => Event::Keepalive,
                _ = deadline_expiry(self.pong_deadline) => Event::PongMissed,
                _ = deadline_expiry(deadline) => Event::Deadline,
            };

            if let Event::Message(Some(Ok(_))) = event {
                self.pong_deadline = None;
            }
            match event {
                Event::Message(Some(Ok(message))) => match message {
                    Message::Text(text) => {
                        log::trace!("Received text frame ({} bytes)", text.len());
                        return Ok(Frame::Text(text.as_str().to_owned()));
                    }
                    Message::Binary(data) => {
                        log::trace!("Received binary frame ({} bytes)", data.len());
                        return Ok(Frame::Binary(data.to_vec()));
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                    Message::Close(close) => {
                        self.mark_closed();
                        let reason = close
                            .map(|frame| {
                                let code = u16::from(frame.code);
                                format!("close frame {} {}", code, frame.reason.as_str())
                            })
                            .unwrap_or_else(|| "close frame".to_string());
                        return Err(ExoError::ConnectionClosed(reason));
                    }
                },
                Event::Message(Some(Err(e))) => {
                    self.mark_closed();
                    return Err(ExoError::ConnectionClosed(format!("WebSocket error: {}", e)));
                }
                Event::Message(None) => {
                    self.mark_closed();
                    return Err(ExoError::ConnectionClosed("stream ended".to_string()));
                }
                Event::Keepalive => {
                    log::trace!("Sending keepalive ping");
                    self.send_message(Message::Ping(Bytes::new())).await?;
                    if self.pong_deadline.is_none() {
                        self.pong_deadline = self
                            .settings
                            .keepalive_interval
                            .map(|period| Instant::now() + period / 2);
                    }
                }
                Event::PongMissed => {
                    log::warn!("No pong from {} after keepalive ping", self.settings.url);
                    self.mark_closed();
                    return Err(ExoError::ConnectionClosed(
                        "keepalive ping not answered".to_string(),
                    ));
                }
                Event::Deadline => {
                    return Err(ExoError::Timeout("waiting for WebSocket frame".to_string()));
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> ExoResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                log::debug!("Closing WebSocket to {} failed: {}", self.settings.url, e);
            }
            log::debug!("WebSocket to {} closed", self.settings.url);
        }
        self.mark_closed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    /// Accept one EXOsocket upgrade, then hold the socket without reading
    async fn silent_controller() -> (Url, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let callback = |_: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                response.headers_mut().insert(
                    SEC_WEBSOCKET_PROTOCOL,
                    HeaderValue::from_static(EXOSOCKET_SUBPROTOCOL),
                );
                Ok(response)
            };
            let _stream = accept_hdr_async(socket, callback).await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let url = Url::parse(&format!("ws://{}{}", address, EXOSOCKET_PATH)).unwrap();
        (url, handle)
    }

    #[test]
    fn test_settings_for_host() {
        let settings = WebSocketSettings::for_host("10.0.0.2").unwrap();
        assert_eq!(settings.url.as_str(), "ws://10.0.0.2/_EXOsocket/");
        assert_eq!(settings.subprotocol, "EXOsocket");
        assert_eq!(settings.keepalive_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_settings_for_host_with_port() {
        let settings = WebSocketSettings::for_host("controller.local:8080").unwrap();
        assert_eq!(settings.url.port(), Some(8080));
        assert_eq!(settings.url.path(), EXOSOCKET_PATH);
    }

    #[tokio::test]
    async fn test_unopened_transport() {
        let mut transport = WebSocketTransport::for_host("10.0.0.2").unwrap();
        assert!(transport.is_closed());
        let err = transport
            .send(Frame::Text("{}".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExoError::NotConnected));
        let err = transport.receive(None).await.unwrap_err();
        assert!(matches!(err, ExoError::NotConnected));
        transport.close().await.unwrap();
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_unanswered_keepalive_closes() {
        let (url, controller) = silent_controller().await;
        let mut settings = WebSocketSettings::new(url);
        settings.keepalive_interval = Some(Duration::from_millis(200));
        let mut transport = WebSocketTransport::new(settings);
        assert_ok!(transport.open().await);
        assert!(!transport.is_closed());

        // ping at 200 ms, pong due by 300 ms
        let err = assert_err!(transport.receive(Some(Duration::from_millis(250))).await);
        assert!(matches!(err, ExoError::Timeout(_)));
        assert!(!transport.is_closed());

        let err = assert_err!(transport.receive(Some(Duration::from_secs(2))).await);
        assert!(matches!(err, ExoError::ConnectionClosed(_)));
        assert!(transport.is_closed());
        let err = assert_err!(transport.receive(None).await);
        assert!(matches!(err, ExoError::NotConnected));
        controller.abort();
    }

    #[tokio::test]
    async fn test_close_after_peer_vanished() {
        let (url, controller) = silent_controller().await;
        let mut transport = WebSocketTransport::new(WebSocketSettings::new(url));
        assert_ok!(transport.open().await);

        controller.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_ok!(transport.close().await);
        assert!(transport.is_closed());
        assert_ok!(transport.close().await);
    }
}
