//! Session layer module for the EXOsocket protocol
//!
//! This crate provides the connection state machine and the session channel,
//! which moves typed messages over a transport in plain or encrypted form and
//! waits for correlated answers.

pub mod channel;
pub mod correlator;
pub mod state;

pub use channel::SessionChannel;
pub use exo_core::{ExoError, ExoResult};
pub use state::ConnectionState;
