//! Client builder
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use exo_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # fn example() -> exo_core::ExoResult<()> {
//! let client = ClientBuilder::new()
//!     .host("192.168.1.50")
//!     .credentials("Operator", "secret")
//!     .read_timeout(Duration::from_secs(20))
//!     .items_per_read(40)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use super::client::ExoClient;
use super::config::ClientConfig;
use exo_core::{ExoError, ExoResult};
use exo_security::Credentials;
use exo_transport::{TransportLayer, WebSocketTransport};
use std::time::Duration;
use url::Url;

/// Builder for EXOsocket clients
///
/// # Configuration Flow
/// 1. Create builder with `ClientBuilder::new()`
/// 2. Point it at a controller with `host()` or `url()`
/// 3. Set credentials unless the session should stay unauthenticated
/// 4. Adjust timeouts and chunking if needed
/// 5. Build with `build()`, or `build_with_transport()` for another transport
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the controller host
    ///
    /// # Arguments
    /// * `host` - Host name or address, optionally with a port (e.g., "192.168.1.50:8080")
    pub fn host(mut self, host: &str) -> Self {
        self.config.host = Some(host.to_string());
        self
    }

    /// Set the full WebSocket URL, overriding the host-derived one
    pub fn url(mut self, url: Url) -> Self {
        self.config.url = Some(url);
        self
    }

    /// Set login credentials
    ///
    /// Empty credentials leave the session unauthenticated.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.config.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn subprotocol(mut self, subprotocol: &str) -> Self {
        self.config.subprotocol = subprotocol.to_string();
        self
    }

    /// Set the keepalive interval, `None` to disable pings
    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the bound on each handshake and login reply
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the deadline for all chunks of one read
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the deadline for one write
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the chunk size for device 0
    pub fn items_per_read(mut self, items: usize) -> Self {
        self.config.batch.items_per_read = items;
        self
    }

    /// Set the chunk size for every other device
    pub fn slave_items_per_read(mut self, items: usize) -> Self {
        self.config.batch.slave_items_per_read = items;
        self
    }

    /// Set the smallest trailing chunk sent on its own
    pub fn min_chunk_items(mut self, items: usize) -> Self {
        self.config.batch.min_chunk_items = items;
        self
    }

    /// Set the implementation announced in the identity offer
    pub fn implementation(mut self, name: &str, version: &str) -> Self {
        self.config.implementation = name.to_string();
        self.config.implementation_version = version.to_string();
        self
    }

    pub fn session_id(mut self, session_id: u32) -> Self {
        self.config.session_id = session_id;
        self
    }

    /// Fetch the error code table from a specific URL
    pub fn error_codes_url(mut self, url: Url) -> Self {
        self.config.error_codes_url = Some(url);
        self.config.fetch_error_codes = true;
        self
    }

    /// Enable or disable fetching the controller's error code table
    pub fn fetch_error_codes(mut self, enabled: bool) -> Self {
        self.config.fetch_error_codes = enabled;
        self
    }

    /// Get the configuration built so far
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a WebSocket client
    ///
    /// # Errors
    /// Returns error if neither a host nor a URL is configured, or if the
    /// configuration is otherwise unusable
    pub fn build(self) -> ExoResult<ExoClient<WebSocketTransport>> {
        self.validate()?;
        if self.config.host.is_none() && self.config.url.is_none() {
            return Err(ExoError::InvalidData(
                "Either a host or a URL must be configured".to_string(),
            ));
        }
        ExoClient::from_config(self.config)
    }

    /// Build a client over a given transport
    ///
    /// The host is only used for the error code table here.
    pub fn build_with_transport<T: TransportLayer>(self, transport: T) -> ExoResult<ExoClient<T>> {
        self.validate()?;
        ExoClient::new(transport, self.config)
    }

    fn validate(&self) -> ExoResult<()> {
        if self.config.read_timeout.is_zero() || self.config.write_timeout.is_zero() {
            return Err(ExoError::InvalidData(
                "Read and write timeouts must be positive".to_string(),
            ));
        }
        if self.config.handshake_timeout.is_zero() {
            return Err(ExoError::InvalidData(
                "Handshake timeout must be positive".to_string(),
            ));
        }
        if self.config.batch.items_per_read == 0 || self.config.batch.slave_items_per_read == 0 {
            return Err(ExoError::InvalidData(
                "Items per read must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exo_transport::MemoryTransport;

    #[test]
    fn test_builder_sets_config() {
        let builder = ClientBuilder::new()
            .host("plant.local")
            .credentials("Operator", "secret")
            .read_timeout(Duration::from_secs(20))
            .write_timeout(Duration::from_secs(2))
            .items_per_read(40)
            .slave_items_per_read(20)
            .min_chunk_items(3)
            .implementation("Tool", "1.0")
            .session_id(7)
            .fetch_error_codes(false);

        let config = builder.config();
        assert_eq!(config.host.as_deref(), Some("plant.local"));
        assert!(config.has_credentials());
        assert_eq!(config.read_timeout, Duration::from_secs(20));
        assert_eq!(config.write_timeout, Duration::from_secs(2));
        assert_eq!(config.batch.items_per_read, 40);
        assert_eq!(config.batch.slave_items_per_read, 20);
        assert_eq!(config.batch.min_chunk_items, 3);
        assert_eq!(config.implementation, "Tool");
        assert_eq!(config.session_id, 7);
        assert!(!config.fetch_error_codes);
    }

    #[test]
    fn test_build_requires_host() {
        assert!(ClientBuilder::new().build().is_err());
        assert!(ClientBuilder::new().host("plant.local").build().is_ok());
        let url = Url::parse("ws://10.0.0.2/_EXOsocket/").unwrap();
        assert!(ClientBuilder::new().url(url).build().is_ok());
    }

    #[test]
    fn test_build_with_transport() {
        let (transport, _peer) = MemoryTransport::pair();
        assert!(ClientBuilder::new().build_with_transport(transport).is_ok());

        let (transport, _peer) = MemoryTransport::pair();
        let result = ClientBuilder::new()
            .read_timeout(Duration::ZERO)
            .build_with_transport(transport);
        assert!(result.is_err());
    }
}
