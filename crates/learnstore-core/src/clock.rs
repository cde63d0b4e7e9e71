//! # Clock
//!
//! Time source for access timestamps, injected into the store so tests
//! control it. The store itself contains no other nondeterminism.

use crate::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of "now" for progress timestamps and session tokens.
pub trait Clock: std::fmt::Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// The wall clock.
///
/// Reads `SystemTime`; a clock set before the epoch reads as 0 rather
/// than failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Timestamp::new(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_epoch() {
        let now = SystemClock.now();
        // Any sane host clock is well past 2020-01-01.
        assert!(now.millis() > 1_577_836_800_000);
    }
}
