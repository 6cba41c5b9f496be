//! EXOsocket connection state machine

use exo_core::{ExoError, ExoResult};

/// Connection state
///
/// # State Transitions
/// ```text
/// Disconnected -> Connected       (transport open)
/// Connected -> Identified         (version and identity exchanged)
/// Identified -> Authenticating    (getChallenge sent)
/// Authenticating -> Authenticated (confirmation checked, seeds exchanged)
/// any -> Disconnected             (close or fatal transport error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket (initial state)
    #[default]
    Disconnected,
    /// Socket open, handshake not done
    Connected,
    /// Handshake done, messages travel as plain text
    Identified,
    /// Login exchange in progress
    Authenticating,
    /// Login done, messages travel encrypted
    Authenticated,
}

impl ConnectionState {
    /// Check if the handshake has completed
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            ConnectionState::Identified | ConnectionState::Authenticated
        )
    }

    /// Check if traffic is encrypted in this state
    pub fn is_encrypted(&self) -> bool {
        matches!(self, ConnectionState::Authenticated)
    }

    /// Check if a socket is open in this state
    pub fn is_open(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    /// Validate state transition
    ///
    /// # Arguments
    /// * `new_state` - The target state
    ///
    /// # Returns
    /// `Ok(())` if transition is valid, `Err` otherwise
    pub fn validate_transition(&self, new_state: ConnectionState) -> ExoResult<()> {
        let valid = match (*self, new_state) {
            (_, ConnectionState::Disconnected) => true,
            (ConnectionState::Disconnected, ConnectionState::Connected) => true,
            (ConnectionState::Connected, ConnectionState::Identified) => true,
            (ConnectionState::Identified, ConnectionState::Authenticating) => true,
            (ConnectionState::Authenticating, ConnectionState::Authenticated) => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(ExoError::Protocol(format!(
                "Invalid state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connected => "Connected",
            ConnectionState::Identified => "Identified",
            ConnectionState::Authenticating => "Authenticating",
            ConnectionState::Authenticated => "Authenticated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let path = [
            ConnectionState::Disconnected,
            ConnectionState::Connected,
            ConnectionState::Identified,
            ConnectionState::Authenticating,
            ConnectionState::Authenticated,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].validate_transition(pair[1]).is_ok());
        }
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(ConnectionState::Authenticated
            .validate_transition(ConnectionState::Identified)
            .is_err());
        assert!(ConnectionState::Identified
            .validate_transition(ConnectionState::Connected)
            .is_err());
        assert!(ConnectionState::Connected
            .validate_transition(ConnectionState::Authenticated)
            .is_err());
        assert!(ConnectionState::Disconnected
            .validate_transition(ConnectionState::Identified)
            .is_err());
    }

    #[test]
    fn test_disconnect_from_anywhere() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connected,
            ConnectionState::Identified,
            ConnectionState::Authenticating,
            ConnectionState::Authenticated,
        ] {
            assert!(state.validate_transition(ConnectionState::Disconnected).is_ok());
        }
    }

    #[test]
    fn test_state_queries() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(ConnectionState::Authenticated.is_encrypted());
        assert!(!ConnectionState::Identified.is_encrypted());
        assert!(ConnectionState::Identified.is_ready());
        assert!(!ConnectionState::Authenticating.is_ready());
        assert!(!ConnectionState::Disconnected.is_open());
        assert_eq!(ConnectionState::Identified.as_str(), "Identified");
    }
}
