//! Monotonic token id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues token ids derived from the wall clock in milliseconds.
///
/// Two ids issued in the same millisecond, from any number of threads, are
/// still distinct: each id is `max(now, previous + 1)`, committed with a
/// compare-and-swap.
#[derive(Debug, Default)]
pub struct TokenIdGenerator {
    last: AtomicU64,
}

impl TokenIdGenerator {
    /// Creates a generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    pub fn next_id(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            // closure never returns None
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }
}
