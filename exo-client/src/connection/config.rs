//! Client configuration

use exo_application::error_codes::ERROR_CODES_PATH;
use exo_application::{BatchSettings, ErrorCodeSource, HttpErrorCodeSource};
use exo_core::{ExoError, ExoResult};
use exo_security::Credentials;
use exo_transport::{EXOSOCKET_SUBPROTOCOL, WebSocketSettings};
use std::time::Duration;
use url::Url;

/// Implementation name announced in the identity offer
pub const DEFAULT_IMPLEMENTATION: &str = "ControllerWebFramework";
/// Implementation version announced in the identity offer
pub const DEFAULT_IMPLEMENTATION_VERSION: &str = "2.0-0-00";

/// Every tunable of one client
///
/// Either `host` or `url` must be set for a WebSocket client. `url` wins
/// when both are set.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Controller host, optionally with a port
    pub host: Option<String>,
    /// Full WebSocket URL of the EXOsocket endpoint
    pub url: Option<Url>,
    /// Login credentials; the session stays unauthenticated without them
    pub credentials: Option<Credentials>,
    pub subprotocol: String,
    pub keepalive_interval: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Bound on every handshake and login reply
    pub handshake_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub batch: BatchSettings,
    pub implementation: String,
    pub implementation_version: String,
    pub session_id: u32,
    /// Location of the controller's error code table
    ///
    /// Defaults to `http://<host>/errorcodes.json`.
    pub error_codes_url: Option<Url>,
    pub fetch_error_codes: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            url: None,
            credentials: None,
            subprotocol: EXOSOCKET_SUBPROTOCOL.to_string(),
            keepalive_interval: Some(Duration::from_secs(60)),
            connect_timeout: Some(Duration::from_secs(10)),
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            batch: BatchSettings::default(),
            implementation: DEFAULT_IMPLEMENTATION.to_string(),
            implementation_version: DEFAULT_IMPLEMENTATION_VERSION.to_string(),
            session_id: 1,
            error_codes_url: None,
            fetch_error_codes: true,
        }
    }
}

impl ClientConfig {
    /// Check if a login runs on connect
    pub fn has_credentials(&self) -> bool {
        self.credentials.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Build the WebSocket settings
    ///
    /// # Errors
    ///
    /// Returns `ExoError::InvalidData` if neither a host nor a URL is set
    pub fn websocket_settings(&self) -> ExoResult<WebSocketSettings> {
        let mut settings = match (&self.url, &self.host) {
            (Some(url), _) => WebSocketSettings::new(url.clone()),
            (None, Some(host)) => WebSocketSettings::for_host(host)?,
            (None, None) => {
                return Err(ExoError::InvalidData(
                    "Either a host or a URL must be configured".to_string(),
                ));
            }
        };
        settings.subprotocol = self.subprotocol.clone();
        settings.connect_timeout = self.connect_timeout;
        settings.keepalive_interval = self.keepalive_interval;
        Ok(settings)
    }

    /// Resolve the error code table location
    pub fn error_codes_url(&self) -> ExoResult<Option<Url>> {
        if !self.fetch_error_codes {
            return Ok(None);
        }
        if let Some(url) = &self.error_codes_url {
            return Ok(Some(url.clone()));
        }

        let host = match (&self.host, &self.url) {
            (Some(host), _) => host.clone(),
            (None, Some(url)) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => return Ok(None),
            },
            (None, None) => return Ok(None),
        };
        Url::parse(&format!("http://{}{}", host, ERROR_CODES_PATH))
            .map(Some)
            .map_err(|e| ExoError::InvalidData(format!("Invalid error code URL: {}", e)))
    }

    /// Create the side channel the error translator fetches from
    pub fn error_code_source(&self) -> ExoResult<Option<Box<dyn ErrorCodeSource>>> {
        match self.error_codes_url()? {
            Some(url) => {
                let source = HttpErrorCodeSource::new(url, self.handshake_timeout)?;
                Ok(Some(Box::new(source)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.subprotocol, "EXOsocket");
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.batch.items_per_read, 80);
        assert_eq!(config.batch.min_chunk_items, 5);
        assert_eq!(config.session_id, 1);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_websocket_settings() {
        let config = ClientConfig {
            host: Some("10.0.0.2:8080".to_string()),
            keepalive_interval: None,
            ..Default::default()
        };
        let settings = config.websocket_settings().unwrap();
        assert_eq!(settings.url.as_str(), "ws://10.0.0.2:8080/_EXOsocket/");
        assert_eq!(settings.keepalive_interval, None);

        assert!(ClientConfig::default().websocket_settings().is_err());
    }

    #[test]
    fn test_error_codes_url() {
        let config = ClientConfig {
            host: Some("plant.local".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.error_codes_url().unwrap().unwrap().as_str(),
            "http://plant.local/errorcodes.json"
        );

        let config = ClientConfig {
            url: Some(Url::parse("ws://10.0.0.2:8080/_EXOsocket/").unwrap()),
            ..Default::default()
        };
        assert_eq!(
            config.error_codes_url().unwrap().unwrap().as_str(),
            "http://10.0.0.2:8080/errorcodes.json"
        );

        let config = ClientConfig {
            host: Some("plant.local".to_string()),
            fetch_error_codes: false,
            ..Default::default()
        };
        assert!(config.error_codes_url().unwrap().is_none());
        assert!(ClientConfig::default().error_codes_url().unwrap().is_none());
    }

    #[test]
    fn test_empty_credentials_skip_login() {
        let config = ClientConfig {
            credentials: Some(Credentials::new("", "")),
            ..Default::default()
        };
        assert!(!config.has_credentials());
    }
}
