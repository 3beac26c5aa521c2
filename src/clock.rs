//! Engine Clock
//!
//! Every time-dependent decision (window expiry, release times, settlement
//! ticks) reads the current time through [`Clock`], so tests can drive time
//! explicitly instead of relying on wall-clock timers.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since Unix epoch (1970-01-01 00:00:00 UTC).
pub type Timestamp = i64;

pub const MILLIS_PER_SEC: i64 = 1_000;
pub const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SEC;

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_millis(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock.
///
/// # Determinism Contract
/// - `now_millis()` only changes through `advance_to` / `advance_by`
/// - time never moves backward (debug assertion)
/// - safe to share between the request path and background tasks
#[derive(Debug, Default)]
pub struct ManualClock {
    current: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: AtomicI64::new(start),
        }
    }

    pub fn from_unix_secs(secs: i64) -> Self {
        Self::new(secs * MILLIS_PER_SEC)
    }

    /// Advance clock to a new time. Panics (debug) if time would go backward.
    pub fn advance_to(&self, new_time: Timestamp) {
        let previous = self.current.swap(new_time, Ordering::SeqCst);
        debug_assert!(
            new_time >= previous,
            "ManualClock: cannot go backward from {} to {}",
            previous,
            new_time
        );
    }

    pub fn advance_by(&self, delta_ms: i64) {
        debug_assert!(delta_ms >= 0, "ManualClock: delta must be non-negative");
        self.current.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_millis(&self) -> Timestamp {
        self.current.load(Ordering::SeqCst)
    }
}

impl fmt::Display for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_timestamp(self.now_millis()))
    }
}

/// Render a timestamp as RFC3339 for logs; falls back to the raw millis.
pub fn format_timestamp(ts: Timestamp) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("{}ms", ts))
}
