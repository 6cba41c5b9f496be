//! Connection trait for EXOsocket clients
//!
//! The narrow surface polling and entity code builds on: connection upkeep,
//! batched reads, single-point writes and the controller identity.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use exo_client::Connection;
//!
//! async fn poll(connection: &dyn Connection, points: &[String]) -> exo_core::ExoResult<()> {
//!     connection.ensure_connected().await?;
//!     let result = connection.read_points_with_errors(points).await?;
//!     for (address, error) in &result.errors {
//!         log::warn!("{}: {}", address, error.text);
//!     }
//!     Ok(())
//! }
//! ```

use exo_application::ReadResult;
use exo_core::{ExoResult, Identity, PointAddress, PointValue};
use std::collections::BTreeMap;

/// Connection trait for EXOsocket operations
///
/// # Error Handling
/// Only connection-level failures are errors: transport loss, handshake or
/// login failure, and read deadlines. Device errors are reported per point
/// in `ReadResult::errors`, and a rejected or unanswered write is `Ok(false)`.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Open the connection, run the handshake and log in
    ///
    /// Does nothing if the connection is already up.
    async fn connect(&self) -> ExoResult<()>;

    /// Close the connection
    async fn close(&self) -> ExoResult<()>;

    /// Reconnect from scratch if the connection has been lost
    async fn ensure_connected(&self) -> ExoResult<()>;

    /// Read points, keeping only values
    async fn read_points(
        &self,
        addresses: &[String],
    ) -> ExoResult<BTreeMap<PointAddress, Option<PointValue>>>;

    /// Read points with their device errors
    async fn read_points_with_errors(&self, addresses: &[String]) -> ExoResult<ReadResult>;

    /// Write one point
    ///
    /// # Returns
    /// `true` if the controller accepted the value
    async fn write_point(&self, address: &str, value: PointValue) -> ExoResult<bool>;

    /// Get the last reported controller identity
    fn identity(&self) -> Identity;
}
