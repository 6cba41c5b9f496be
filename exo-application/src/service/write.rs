//! Write service

use crate::correlation::{ContextAllocator, ContextKind};
use crate::error_codes::{ErrorDetail, ErrorTranslator};
use crate::pdu::{Message, UpdateParams};
use crate::service::read::ReadResult;
use exo_core::{ExoError, ExoResult, PointAddress, PointValue, SessionLevel};

/// Result of a single-point write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The controller answered without an error for the point
    Accepted,
    /// The controller reported a device error for the point
    Rejected(ErrorDetail),
    /// No answer arrived before the write deadline
    TimedOut,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Accepted)
    }
}

/// Gates and prepares single-point writes
#[derive(Debug, Clone, Default)]
pub struct WriteService;

impl WriteService {
    pub fn new() -> Self {
        Self
    }

    /// Check that the session may write
    ///
    /// An unknown level, reported above the 0-4 range, is not gated.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::AccessDenied` for the None and Guest levels
    pub fn authorize(level: Option<SessionLevel>) -> ExoResult<()> {
        match level {
            Some(level) if !level.can_write() => Err(ExoError::AccessDenied(format!(
                "Write operations not allowed for session level {}",
                level
            ))),
            _ => Ok(()),
        }
    }

    /// Validate the address, check the level and build the `write`
    ///
    /// Nothing is allocated when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::InvalidAddress` or `ExoError::AccessDenied`
    pub fn prepare(
        &self,
        contexts: &mut ContextAllocator,
        level: Option<SessionLevel>,
        address: &str,
        value: PointValue,
    ) -> ExoResult<(PointAddress, u32, Message)> {
        let address = PointAddress::from_string(address)?;
        Self::authorize(level)?;
        let context = contexts.next(ContextKind::Peek);
        let message = Message::write(context, address.device(), address.item(), value);
        Ok((address, context, message))
    }

    /// Decide the outcome from the answer, if any
    pub fn evaluate(
        &self,
        address: &PointAddress,
        update: Option<&UpdateParams>,
        translator: &ErrorTranslator,
    ) -> WriteOutcome {
        let Some(update) = update else {
            log::error!("Write timeout for {}", address);
            return WriteOutcome::TimedOut;
        };

        let mut result = ReadResult::new();
        result.merge_update(update, translator);
        match result.errors.remove(address) {
            Some(detail) => {
                log::error!("Write failed for {}: {} ({})", address, detail.code, detail.text);
                WriteOutcome::Rejected(detail)
            }
            None => {
                log::info!("Write successful for {}", address);
                WriteOutcome::Accepted
            }
        }
    }
}
