//! Authentication Challenge-Response Flow
//!
//! This module tracks the client side of the EXOsocket login exchange.
//!
//! # Flow Overview
//!
//! 1. **getChallenge**: client sends a fresh, byte-swapped nonce 1
//! 2. **authChallenge**: server answers with its nonce
//! 3. **authenticate**: client sends nonce 2 and the derived challenge response
//! 4. **authenticateReply**: server proves it knows the credentials by
//!    returning the expected confirmation
//!
//! The flow owns the nonces and the derived material so the session key only
//! leaves it after the confirmation has been checked.
//!
//! # Usage
//!
//! ```rust,no_run
//! use exo_security::{AuthenticationFlow, Credentials};
//!
//! # fn run(server_nonce: u32, confirmation: Option<u32>) -> exo_security::ExoResult<()> {
//! let mut flow = AuthenticationFlow::new(Credentials::new("Operator", "secret"));
//! let client_nonce1 = flow.begin()?;
//! // ... send getChallenge, receive authChallenge ...
//! let answer = flow.respond(server_nonce)?;
//! // ... send authenticate, receive authenticateReply ...
//! let session_key = flow.verify_confirmation(confirmation)?;
//! # Ok(())
//! # }
//! ```

use crate::authentication::{AuthMaterial, Credentials, derive_auth_material};
use crate::constants::KEY_LENGTH;
use crate::utils::{random_u32, swap_u32};
use exo_core::{ExoError, ExoResult};

/// Authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationState {
    /// Nothing sent yet
    NotAuthenticated,
    /// getChallenge sent, waiting for the server nonce
    ChallengeRequested,
    /// authenticate sent, waiting for the confirmation
    ResponseSent,
    /// Confirmation matched
    Authenticated,
    /// Any step failed
    AuthenticationFailed,
}

/// Fields of the `authenticate` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeResponse {
    pub client_nonce2: u32,
    pub response: u32,
}

/// Client side login state machine
#[derive(Debug)]
pub struct AuthenticationFlow {
    credentials: Credentials,
    state: AuthenticationState,
    client_nonce1: Option<u32>,
    client_nonce2: Option<u32>,
    material: Option<AuthMaterial>,
}

impl AuthenticationFlow {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            state: AuthenticationState::NotAuthenticated,
            client_nonce1: None,
            client_nonce2: None,
            material: None,
        }
    }

    /// Get current authentication state
    pub fn state(&self) -> AuthenticationState {
        self.state
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Check if authenticated
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthenticationState::Authenticated)
    }

    /// Start the exchange with a random nonce
    ///
    /// # Returns
    ///
    /// Client nonce 1 as it goes on the wire
    pub fn begin(&mut self) -> ExoResult<u32> {
        self.begin_with_nonce(swap_u32(random_u32()))
    }

    /// Start the exchange with a given wire nonce
    pub fn begin_with_nonce(&mut self, client_nonce1: u32) -> ExoResult<u32> {
        if self.state != AuthenticationState::NotAuthenticated {
            return Err(ExoError::Authentication(format!(
                "Cannot request a challenge in state {:?}",
                self.state
            )));
        }
        self.client_nonce1 = Some(client_nonce1);
        self.state = AuthenticationState::ChallengeRequested;
        Ok(client_nonce1)
    }

    /// Answer the server challenge with a random nonce 2
    pub fn respond(&mut self, server_nonce: u32) -> ExoResult<ChallengeResponse> {
        self.respond_with_nonce(server_nonce, swap_u32(random_u32()))
    }

    /// Answer the server challenge with a given wire nonce 2
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Authentication` if no challenge has been requested
    pub fn respond_with_nonce(
        &mut self,
        server_nonce: u32,
        client_nonce2: u32,
    ) -> ExoResult<ChallengeResponse> {
        let client_nonce1 = match (self.state, self.client_nonce1) {
            (AuthenticationState::ChallengeRequested, Some(nonce)) => nonce,
            _ => {
                return Err(ExoError::Authentication(format!(
                    "Cannot answer a challenge in state {:?}",
                    self.state
                )));
            }
        };

        let material =
            derive_auth_material(&self.credentials, client_nonce1, server_nonce, client_nonce2);
        let response = ChallengeResponse {
            client_nonce2,
            response: material.response,
        };
        self.client_nonce2 = Some(client_nonce2);
        self.material = Some(material);
        self.state = AuthenticationState::ResponseSent;
        Ok(response)
    }

    /// Check the server's confirmation
    ///
    /// # Returns
    ///
    /// The session key, once the server has proven it derived the same material
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Authentication` if the confirmation is missing or wrong
    pub fn verify_confirmation(&mut self, confirmation: Option<u32>) -> ExoResult<[u8; KEY_LENGTH]> {
        let material = match (self.state, self.material.as_ref()) {
            (AuthenticationState::ResponseSent, Some(material)) => material,
            _ => {
                return Err(ExoError::Authentication(format!(
                    "Cannot verify a confirmation in state {:?}",
                    self.state
                )));
            }
        };

        match confirmation {
            Some(value) if value == material.confirmation => {
                let key = material.session_key;
                self.state = AuthenticationState::Authenticated;
                Ok(key)
            }
            Some(_) => {
                log::debug!("Confirmation for {} does not match", self.credentials.username());
                self.fail();
                Err(ExoError::Authentication("Login confirmation mismatch".to_string()))
            }
            None => {
                self.fail();
                Err(ExoError::Authentication("Login confirmation missing".to_string()))
            }
        }
    }

    /// Mark the exchange as failed and forget derived material
    pub fn fail(&mut self) {
        if self.state != AuthenticationState::AuthenticationFailed {
            log::debug!("Login exchange failed in state {:?}", self.state);
        }
        self.material = None;
        self.state = AuthenticationState::AuthenticationFailed;
    }

    /// Client nonces used in this exchange
    pub fn nonces(&self) -> (Option<u32>, Option<u32>) {
        (self.client_nonce1, self.client_nonce2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> AuthenticationFlow {
        AuthenticationFlow::new(Credentials::new("Operator", "secret"))
    }

    #[test]
    fn test_full_exchange() {
        let mut flow = flow();
        assert_eq!(flow.begin_with_nonce(0x12345678).unwrap(), 0x12345678);
        assert_eq!(flow.state(), AuthenticationState::ChallengeRequested);

        let answer = flow.respond_with_nonce(0x9ABCDEF0, 0x0BADF00D).unwrap();
        assert_eq!(answer.client_nonce2, 0x0BADF00D);
        assert_eq!(answer.response, 0x63EB7564);

        let key = flow.verify_confirmation(Some(0x596307B0)).unwrap();
        assert_eq!(key[0], 0xdc);
        assert!(flow.is_authenticated());
        assert_eq!(flow.nonces(), (Some(0x12345678), Some(0x0BADF00D)));
    }

    #[test]
    fn test_confirmation_mismatch() {
        let mut flow = flow();
        flow.begin_with_nonce(1).unwrap();
        flow.respond_with_nonce(2, 3).unwrap();
        assert!(flow.verify_confirmation(Some(0)).is_err());
        assert_eq!(flow.state(), AuthenticationState::AuthenticationFailed);
    }

    #[test]
    fn test_confirmation_missing() {
        let mut flow = flow();
        flow.begin().unwrap();
        flow.respond(0xCAFEBABE).unwrap();
        let err = flow.verify_confirmation(None).unwrap_err();
        assert!(matches!(err, ExoError::Authentication(_)));
    }

    #[test]
    fn test_out_of_order_steps() {
        let mut flow = flow();
        assert!(flow.respond(1).is_err());
        assert!(flow.verify_confirmation(Some(1)).is_err());
        flow.begin().unwrap();
        assert!(flow.begin().is_err());
    }
}
