//! Security module for the EXOsocket protocol
//!
//! This crate provides the vendor challenge-response login, which derives the
//! AES-128 session key, and the chained frame cipher that wraps every message
//! once the session is authenticated.

pub mod auth_flow;
pub mod authentication;
pub mod cipher;
pub mod constants;
pub mod framing;
pub mod utils;

pub use auth_flow::{AuthenticationFlow, AuthenticationState, ChallengeResponse};
pub use authentication::{AuthMaterial, Credentials, derive_auth_material};
pub use cipher::BlockCipher;
pub use exo_core::{ExoError, ExoResult};
pub use framing::ChainedFrameCipher;
