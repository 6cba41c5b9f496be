//! exosocket - Rust client for the EXOsocket controller protocol
//!
//! EXOsocket is the WebSocket protocol building-automation controllers use
//! to expose their points. This library connects, logs in, and reads and
//! writes points over the encrypted session.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `exo-core`: Core types and error handling
//! - `exo-transport`: Transport layer (WebSocket, in-memory)
//! - `exo-security`: Security layer (login key derivation, frame cipher)
//! - `exo-application`: Application layer (messages, correlation, batching, error codes)
//! - `exo-session`: Session layer (connection state, message channel)
//! - `exo-client`: Client implementation
//!
//! # Usage
//!
//! ```no_run
//! use exosocket::client::ClientBuilder;
//!
//! # async fn example() -> exosocket::ExoResult<()> {
//! let client = ClientBuilder::new()
//!     .host("192.168.1.50")
//!     .credentials("Operator", "secret")
//!     .build()?;
//! client.connect().await?;
//! let values = client.read_points(&["0:100"]).await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use exo_core::{ExoError, ExoResult, Identity, PointAddress, PointValue, SessionLevel};

// Re-export client API
pub mod client {
    pub use exo_client::*;
    pub use exo_session::ConnectionState;
}

// Re-export result types of reads and writes
pub mod application {
    pub use exo_application::{
        BatchSettings, ErrorCodeTable, ErrorDetail, ReadResult, WriteOutcome,
    };
}

// Re-export lower layers for custom transports and tooling
pub mod transport {
    pub use exo_transport::*;
}

pub mod security {
    pub use exo_security::*;
}
