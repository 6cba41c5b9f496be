//! Challenge-response login
//!
//! # Exchange
//!
//! 1. `getChallenge` with client nonce 1, answered by `authChallenge` with
//!    the server nonce
//! 2. `authenticate` with client nonce 2 and the challenge response,
//!    answered by `authenticateReply` with the confirmation
//! 3. raw 16-byte seeds in both directions, which become the chaining
//!    accumulators of the frame cipher
//! 4. the first encrypted message, `sessionLevel`
//!
//! Every failure is fatal for the connection.

use exo_application::Message;
use exo_core::{ExoError, ExoResult, SessionLevel};
use exo_security::constants::ACCUMULATOR_LENGTH;
use exo_security::utils::generate_iv;
use exo_security::{AuthenticationFlow, ChainedFrameCipher, Credentials};
use exo_session::{ConnectionState, SessionChannel};
use exo_transport::{Frame, TransportLayer};
use std::time::Duration;

/// Log in on an identified channel
///
/// # Returns
///
/// The granted session level, `None` if the controller reported none or an
/// unknown one
///
/// # Errors
///
/// Returns `ExoError::Authentication` for a missing or wrong reply, and
/// transport errors as they are
pub async fn perform_login<T: TransportLayer>(
    channel: &mut SessionChannel<T>,
    credentials: &Credentials,
    timeout: Duration,
) -> ExoResult<Option<SessionLevel>> {
    channel.transition(ConnectionState::Authenticating)?;
    let mut flow = AuthenticationFlow::new(credentials.clone());
    let result = exchange(channel, &mut flow, timeout).await;
    if let Err(e) = &result {
        flow.fail();
        log::error!("Login as {} failed: {}", credentials.username(), e);
    }
    result
}

async fn exchange<T: TransportLayer>(
    channel: &mut SessionChannel<T>,
    flow: &mut AuthenticationFlow,
    timeout: Duration,
) -> ExoResult<Option<SessionLevel>> {
    let client_nonce1 = flow.begin()?;
    channel.send(&Message::get_challenge(client_nonce1)).await?;

    let server_nonce = match await_reply(channel, "authChallenge", timeout).await? {
        Message::AuthChallenge { params } => params.server_nonce,
        _ => None,
    }
    .ok_or_else(|| ExoError::Authentication("Challenge reply without server nonce".to_string()))?;

    let challenge = flow.respond(server_nonce)?;
    let request = Message::authenticate(
        flow.credentials().username(),
        challenge.client_nonce2,
        challenge.response,
    );
    channel.send(&request).await?;

    let confirmation = match await_reply(channel, "authenticateReply", timeout).await? {
        Message::AuthenticateReply {
            error: Some(error), ..
        } => {
            return Err(ExoError::Authentication(format!("Login rejected: {}", error)));
        }
        Message::AuthenticateReply { params, .. } => params.confirmation,
        _ => None,
    };
    let session_key = flow.verify_confirmation(confirmation)?;

    let mut cipher = ChainedFrameCipher::from_key(&session_key);
    let seed = generate_iv()?;
    cipher.set_send_accumulator(seed);
    channel.send_raw(Frame::Binary(seed.to_vec())).await?;

    match channel.receive_raw(Some(timeout)).await.map_err(login_error)? {
        Frame::Binary(data) if data.len() == ACCUMULATOR_LENGTH => {
            cipher.set_receive_accumulator(&data)?;
        }
        other => {
            return Err(ExoError::Authentication(format!(
                "Expected a {}-byte binary seed, got a {} frame of {} bytes",
                ACCUMULATOR_LENGTH,
                other.kind(),
                other.len()
            )));
        }
    }
    channel.enable_encryption(cipher)?;

    let level = match await_reply(channel, "sessionLevel", timeout).await? {
        Message::SessionLevel { params } => params.session_level,
        _ => None,
    };
    let level = match level.map(|raw| (raw, SessionLevel::from_level(raw))) {
        Some((raw, Some(level))) => {
            if raw < 0 {
                log::warn!("Controller granted negative session level {}, treating as {}", raw, level);
            }
            Some(level)
        }
        Some((raw, None)) => {
            log::warn!("Controller granted unknown session level {}", raw);
            None
        }
        None => {
            log::warn!("Controller did not report a session level");
            None
        }
    };
    channel.set_session_level(level);

    match level {
        Some(level) => log::info!("Logged in as {}, session level {}", flow.credentials().username(), level),
        None => log::info!("Logged in as {}", flow.credentials().username()),
    }
    Ok(level)
}

async fn await_reply<T: TransportLayer>(
    channel: &mut SessionChannel<T>,
    method: &str,
    timeout: Duration,
) -> ExoResult<Message> {
    channel
        .await_method(method, timeout)
        .await
        .map_err(login_error)
}

fn login_error(error: ExoError) -> ExoError {
    match error {
        ExoError::Timeout(what) => ExoError::Authentication(format!("Timed out {}", what)),
        other => other,
    }
}
