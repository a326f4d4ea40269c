//! Write timestamps
//!
//! Wall-clock milliseconds, made strictly increasing per process so that
//! two writes never share a timestamp and the later one always wins.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Hands out strictly increasing write timestamps
#[derive(Debug, Default)]
pub struct TimestampOracle {
    last: AtomicI64,
}

impl TimestampOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp: the clock, or one past the previous timestamp if the
    /// clock has not moved (or moved backwards)
    pub fn next(&self) -> i64 {
        let now = now_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    /// Make every later timestamp greater than `ts`
    ///
    /// Called on open with the newest stored timestamp, so writes after a
    /// restart still win over data written under a faster clock.
    pub fn observe(&self, ts: i64) {
        self.last.fetch_max(ts, Ordering::SeqCst);
    }
}
