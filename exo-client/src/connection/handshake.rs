//! Version and identity handshake
//!
//! ```text
//! versionOffer  -> versionAck
//! identity      -> identity
//! ```
//!
//! Both replies are awaited within the handshake timeout. Unrelated frames
//! arriving meanwhile go through the generic receive path and are dropped.

use super::config::ClientConfig;
use exo_application::Message;
use exo_core::{ExoError, ExoResult, Identity};
use exo_session::{ConnectionState, SessionChannel};
use exo_transport::TransportLayer;

/// Run the handshake on a freshly opened channel
///
/// # Returns
///
/// The identity the controller answered with
///
/// # Errors
///
/// Returns `ExoError::Handshake` when a reply does not arrive in time, and
/// transport errors as they are
pub async fn perform_handshake<T: TransportLayer>(
    channel: &mut SessionChannel<T>,
    config: &ClientConfig,
) -> ExoResult<Identity> {
    let timeout = config.handshake_timeout;

    channel.send(&Message::version_offer()).await?;
    channel
        .await_method("versionAck", timeout)
        .await
        .map_err(handshake_error)?;

    let offer = Message::identity_offer(
        &config.implementation,
        &config.implementation_version,
        config.session_id,
    );
    channel.send(&offer).await?;
    channel
        .await_method("identity", timeout)
        .await
        .map_err(handshake_error)?;

    channel.transition(ConnectionState::Identified)?;
    let identity = channel.identity();
    log::info!(
        "Connected to {} (project {})",
        identity.controller_name.as_deref().unwrap_or("unknown controller"),
        identity.project_name.as_deref().unwrap_or("unknown")
    );
    Ok(identity)
}

fn handshake_error(error: ExoError) -> ExoError {
    match error {
        ExoError::Timeout(what) => ExoError::Handshake(format!("Timed out {}", what)),
        other => other,
    }
}
