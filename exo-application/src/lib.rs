//! Application layer module for the EXOsocket protocol
//!
//! This crate provides the typed protocol messages, correlation id handling,
//! point batching, device error translation and the read/write services.

pub mod batcher;
pub mod correlation;
pub mod error_codes;
pub mod pdu;
pub mod service;

pub use batcher::{BatchSettings, PointBatcher, PointChunk};
pub use correlation::{ContextAllocator, ContextKind, PendingRequests};
pub use error_codes::{
    ErrorCodeDocument, ErrorCodeSource, ErrorCodeTable, ErrorDetail, ErrorTranslator,
    HttpErrorCodeSource,
};
pub use exo_core::{ExoError, ExoResult};
pub use pdu::Message;
pub use service::{ReadResult, ReadService, WriteOutcome, WriteService};
