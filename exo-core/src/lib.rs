//! Core types and utilities for the EXOsocket protocol
//!
//! This crate provides the fundamental types shared by every layer of the
//! client: the error taxonomy, point addressing, session permission levels
//! and controller identity.

pub mod error;
pub mod identity;
pub mod point;
pub mod session_level;

pub use error::{ExoError, ExoResult};
pub use identity::Identity;
pub use point::{PointAddress, PointValue};
pub use session_level::SessionLevel;
