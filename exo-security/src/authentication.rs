//! Challenge-response key derivation
//!
//! The controller and the client both hash the credentials, mix in three
//! nonces (two from the client, one from the server) and derive:
//!
//! - the AES-128 session key used by the frame cipher,
//! - the challenge response the client proves itself with,
//! - the confirmation the server must echo back.
//!
//! All nonces are taken exactly as they appear on the wire.

use crate::cipher::BlockCipher;
use crate::constants::{BLOCK_SIZE, KEY_LENGTH};
use crate::utils::swap_u32;
use sha2::{Digest, Sha256};
use std::fmt;

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Check if there is nothing to log in with
    ///
    /// A session without credentials stays unauthenticated.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// SHA-256 over `lowercase(username) 0x00 password 0x00`
    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.username.to_lowercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.password.as_bytes());
        hasher.update([0u8]);
        hasher.finalize().into()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Values derived from one login exchange
#[derive(Clone, PartialEq, Eq)]
pub struct AuthMaterial {
    /// AES-128 session key
    pub session_key: [u8; KEY_LENGTH],
    /// Challenge response sent in `authenticate`
    pub response: u32,
    /// Confirmation the server must return in `authenticateReply`
    pub confirmation: u32,
}

impl fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMaterial")
            .field("session_key", &"<redacted>")
            .field("response", &self.response)
            .field("confirmation", &self.confirmation)
            .finish()
    }
}

/// Derive the session key, challenge response and expected confirmation
///
/// # Arguments
///
/// * `credentials` - Username and password
/// * `client_nonce1` - Client nonce 1 as sent in `getChallenge`
/// * `server_nonce` - Server nonce as received in `authChallenge`
/// * `client_nonce2` - Client nonce 2 as sent in `authenticate`
pub fn derive_auth_material(
    credentials: &Credentials,
    client_nonce1: u32,
    server_nonce: u32,
    client_nonce2: u32,
) -> AuthMaterial {
    let digest = credentials.digest();
    let mut words = [0u32; 8];
    for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    words[5] ^= swap_u32(client_nonce1);
    words[6] ^= swap_u32(server_nonce);
    words[7] ^= swap_u32(client_nonce2);

    let mut session_key = [0u8; KEY_LENGTH];
    let mut block = [0u8; BLOCK_SIZE];
    for i in 0..4 {
        session_key[i * 4..i * 4 + 4].copy_from_slice(&(words[i] ^ words[i + 4]).to_be_bytes());
        block[i * 4..i * 4 + 4].copy_from_slice(&words[i + 4].to_be_bytes());
    }

    let encrypted = BlockCipher::new(&session_key).encrypt_block(&block);
    let response = swap_u32(u32::from_be_bytes([
        encrypted[0],
        encrypted[1],
        encrypted[2],
        encrypted[3],
    ]));
    let confirmation = swap_u32(u32::from_be_bytes([
        encrypted[4],
        encrypted[5],
        encrypted[6],
        encrypted[7],
    ]));

    AuthMaterial {
        session_key,
        response,
        confirmation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_digest_lowercases_username() {
        let upper = Credentials::new("Operator", "secret");
        let lower = Credentials::new("operator", "secret");
        assert_eq!(upper.digest(), lower.digest());
        assert_eq!(
            upper.digest().to_vec(),
            from_hex("22547b2b52282cd317d99f57017e2385fe85a4fdd43c7f11dde7bb70e5d47794")
        );
    }

    #[test]
    fn test_golden_vector() {
        let credentials = Credentials::new("Operator", "secret");
        let material = derive_auth_material(&credentials, 0x12345678, 0x9ABCDEF0, 0x0BADF00D);

        assert_eq!(
            material.session_key.to_vec(),
            from_hex("dcd1dfd6fe4267d03ae098bde95af91a")
        );
        assert_eq!(material.response, 0x63EB7564);
        assert_eq!(material.confirmation, 0x596307B0);
    }

    #[test]
    fn test_nonces_change_material() {
        let credentials = Credentials::new("Operator", "secret");
        let a = derive_auth_material(&credentials, 1, 2, 3);
        let b = derive_auth_material(&credentials, 1, 2, 4);
        assert_ne!(a.session_key, b.session_key);
        assert_ne!(a.response, b.response);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::new("admin", "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
        let material = derive_auth_material(&credentials, 1, 2, 3);
        assert!(format!("{:?}", material).contains("<redacted>"));
    }

    #[test]
    fn test_credentials_is_empty() {
        assert!(Credentials::new("", "").is_empty());
        assert!(!Credentials::new("guest", "").is_empty());
    }
}
