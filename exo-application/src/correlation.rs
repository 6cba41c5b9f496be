//! Correlation ids and pending request tracking
//!
//! Each `read`/`write` request carries a numeric `context` that the
//! controller echoes in its `update`. Ids come from two disjoint ranges:
//!
//! | kind   | range            | used by                     |
//! |--------|------------------|-----------------------------|
//! | peek   | 0..=99999        | reads and writes            |
//! | advise | 200100..=299999  | long-poll subscription reads |
//!
//! Each range wraps to its start after its maximum.

use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

pub const PEEK_CONTEXT_MIN: u32 = 0;
pub const PEEK_CONTEXT_MAX: u32 = 99_999;
pub const ADVISE_CONTEXT_MIN: u32 = 200_100;
pub const ADVISE_CONTEXT_MAX: u32 = 299_999;

/// Correlation id range selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Peek,
    Advise,
}

impl ContextKind {
    /// Get the id range of this kind
    pub fn range(&self) -> RangeInclusive<u32> {
        match self {
            ContextKind::Peek => PEEK_CONTEXT_MIN..=PEEK_CONTEXT_MAX,
            ContextKind::Advise => ADVISE_CONTEXT_MIN..=ADVISE_CONTEXT_MAX,
        }
    }
}

/// Allocator for correlation ids
#[derive(Debug, Clone)]
pub struct ContextAllocator {
    next_peek: u32,
    next_advise: u32,
}

impl ContextAllocator {
    pub fn new() -> Self {
        Self {
            next_peek: PEEK_CONTEXT_MIN,
            next_advise: ADVISE_CONTEXT_MIN,
        }
    }

    /// Get the next id of a kind and advance its counter
    ///
    /// # Returns
    ///
    /// The next id (wraps around to the start of the kind's range)
    pub fn next(&mut self, kind: ContextKind) -> u32 {
        let (counter, min, max) = match kind {
            ContextKind::Peek => (&mut self.next_peek, PEEK_CONTEXT_MIN, PEEK_CONTEXT_MAX),
            ContextKind::Advise => (&mut self.next_advise, ADVISE_CONTEXT_MIN, ADVISE_CONTEXT_MAX),
        };
        let id = *counter;
        *counter = if id >= max { min } else { id + 1 };
        id
    }
}

impl Default for ContextAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outstanding chunk requests of one logical call
///
/// The call is complete once every id has been answered. Answers for ids
/// outside the set (late replies to abandoned calls) are refused.
#[derive(Debug, Clone)]
pub struct PendingRequests<T> {
    pending: Vec<u32>,
    results: Vec<(u32, T)>,
    issued_at: Instant,
    deadline: Instant,
}

impl<T> PendingRequests<T> {
    /// Start tracking a set of ids
    ///
    /// # Arguments
    ///
    /// * `contexts` - Ids of the chunk requests just sent
    /// * `timeout` - Time allowed for all of them to be answered
    pub fn new(contexts: impl IntoIterator<Item = u32>, timeout: Duration) -> Self {
        let issued_at = Instant::now();
        let mut pending: Vec<u32> = Vec::new();
        for context in contexts {
            if !pending.contains(&context) {
                pending.push(context);
            }
        }
        Self {
            pending,
            results: Vec::new(),
            issued_at,
            deadline: issued_at + timeout,
        }
    }

    /// Check if an id is still awaited
    pub fn is_pending(&self, context: u32) -> bool {
        self.pending.contains(&context)
    }

    /// Store the answer for an id
    ///
    /// # Returns
    ///
    /// `false` if the id was not pending; the payload is dropped
    pub fn accept(&mut self, context: u32, payload: T) -> bool {
        match self.pending.iter().position(|&id| id == context) {
            Some(index) => {
                self.pending.remove(index);
                self.results.push((context, payload));
                true
            }
            None => false,
        }
    }

    /// Check if every id has been answered
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get the number of ids still awaited
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Get the ids still awaited
    pub fn pending_contexts(&self) -> &[u32] {
        &self.pending
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Get the time left before the deadline
    ///
    /// # Returns
    ///
    /// `None` once the deadline has passed
    pub fn remaining(&self) -> Option<Duration> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() { None } else { Some(remaining) }
    }

    /// Take the answers, in arrival order
    pub fn into_results(self) -> Vec<(u32, T)> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_ids_wrap() {
        let mut allocator = ContextAllocator::new();
        assert_eq!(allocator.next(ContextKind::Peek), 0);
        assert_eq!(allocator.next(ContextKind::Peek), 1);

        allocator.next_peek = PEEK_CONTEXT_MAX;
        assert_eq!(allocator.next(ContextKind::Peek), 99_999);
        assert_eq!(allocator.next(ContextKind::Peek), 0);
    }

    #[test]
    fn test_advise_ids_wrap() {
        let mut allocator = ContextAllocator::new();
        assert_eq!(allocator.next(ContextKind::Advise), 200_100);

        allocator.next_advise = ADVISE_CONTEXT_MAX;
        assert_eq!(allocator.next(ContextKind::Advise), 299_999);
        assert_eq!(allocator.next(ContextKind::Advise), 200_100);
    }

    #[test]
    fn test_ranges_never_collide() {
        let mut allocator = ContextAllocator::new();
        let peek = ContextKind::Peek.range();
        let advise = ContextKind::Advise.range();
        for _ in 0..250_000 {
            let a = allocator.next(ContextKind::Peek);
            let b = allocator.next(ContextKind::Advise);
            assert!(peek.contains(&a));
            assert!(advise.contains(&b));
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_pending_requests() {
        let mut pending = PendingRequests::new([3, 4, 4], Duration::from_secs(10));
        assert_eq!(pending.outstanding(), 2);
        assert!(!pending.accept(9, "stray"));
        assert!(pending.accept(4, "four"));
        assert!(!pending.accept(4, "duplicate"));
        assert!(!pending.is_complete());
        assert!(pending.accept(3, "three"));
        assert!(pending.is_complete());
        assert!(pending.remaining().is_some());
        assert_eq!(pending.into_results(), vec![(4, "four"), (3, "three")]);
    }

    #[test]
    fn test_pending_requests_deadline() {
        let pending: PendingRequests<()> = PendingRequests::new([1], Duration::ZERO);
        assert!(pending.remaining().is_none());
        assert_eq!(pending.pending_contexts(), &[1]);
    }
}
