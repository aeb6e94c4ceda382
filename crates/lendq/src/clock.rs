//! Injectable time source.
//!
//! Accrual math depends only on elapsed wall-clock time, so the engine
//! takes its clock as a trait object. Production uses [`SystemClock`];
//! tests use [`ManualClock`] to simulate elapsed time without waiting.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::types::TimestampMs;

/// A wall-clock source, millisecond precision
pub trait Clock: Send + Sync {
    /// Current time as Unix milliseconds
    fn now_ms(&self) -> TimestampMs;
}

/// Real wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Settable clock for deterministic tests
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: TimestampMs) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    /// Move the clock forward
    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: TimestampMs) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}
