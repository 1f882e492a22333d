//! Time sources for cache stamps and request counters.
//!
//! The dispatcher never reads the system time directly; it asks a [`Clock`].
//! Production code uses [`SystemClock`], tests and simulations use
//! [`ManualClock`] to step time deterministically.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Instant;

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> i64;

    /// High-resolution timer in fractional milliseconds, if the environment has one.
    fn high_res_ms(&self) -> Option<f64> {
        None
    }
}

/// Clock backed by `chrono::Utc` and a monotonic `Instant`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn high_res_ms(&self) -> Option<f64> {
        Some(self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

/// Manually advanced clock.
///
/// Starts at the given epoch milliseconds and only moves when told to. The
/// high-resolution timer can be switched off to mimic environments without one.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
    high_res: AtomicBool,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
            high_res: AtomicBool::new(true),
        }
    }

    /// Clock with no high-resolution timer available.
    pub fn without_timer(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
            high_res: AtomicBool::new(false),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_timer_available(&self, available: bool) {
        self.high_res.store(available, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn high_res_ms(&self) -> Option<f64> {
        self.high_res
            .load(Ordering::SeqCst)
            .then(|| self.now_ms() as f64)
    }
}
