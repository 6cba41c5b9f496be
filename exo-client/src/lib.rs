//! EXOsocket client implementation
//!
//! This crate provides the client that connects to a controller, runs the
//! version/identity handshake and the challenge-response login, and then
//! reads and writes points over the encrypted session.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use exo_client::ClientBuilder;
//!
//! # async fn example() -> exo_core::ExoResult<()> {
//! let client = ClientBuilder::new()
//!     .host("192.168.1.50")
//!     .credentials("Operator", "secret")
//!     .build()?;
//! client.connect().await?;
//!
//! let values = client.read_points(&["0:100", "0:101"]).await?;
//! let accepted = client.write_point("0:332", serde_json::json!(21.5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;

pub use connection::{ClientBuilder, ClientConfig, Connection, ExoClient};
