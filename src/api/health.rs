//! Outcome of the most recent upstream fetch, for the /health endpoint.
//! Written by the roster loader, read by the health handler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// Whether the last fetch returned a roster. Meaningless while `last_fetch_at_ns` is 0.
    last_fetch_ok: AtomicBool,
    /// Nanosecond timestamp of the last fetch attempt (0 = none yet).
    last_fetch_at_ns: AtomicU64,
    fetch_failures: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_ns: u64) {
        self.last_fetch_ok.store(true, Ordering::Relaxed);
        self.last_fetch_at_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn record_failure(&self, at_ns: u64) {
        self.last_fetch_ok.store(false, Ordering::Relaxed);
        self.last_fetch_at_ns.store(at_ns, Ordering::Relaxed);
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// None until the first fetch has happened.
    pub fn last_fetch_ok(&self) -> Option<bool> {
        if self.last_fetch_at_ns() == 0 {
            return None;
        }
        Some(self.last_fetch_ok.load(Ordering::Relaxed))
    }

    pub fn last_fetch_at_ns(&self) -> u64 {
        self.last_fetch_at_ns.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }
}
