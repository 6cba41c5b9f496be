//! Point services
//!
//! The services turn point addresses into correlated requests and turn
//! `update` answers back into typed results. They never touch the socket;
//! the session layer sends what they prepare and hands back what arrives.

pub mod read;
pub mod write;

pub use read::{ReadResult, ReadService};
pub use write::{WriteOutcome, WriteService};
