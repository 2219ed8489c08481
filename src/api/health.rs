//! Shared health state for the /health endpoint.
//! Updated by the price-write path, read by the API.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub struct HealthState {
    /// Nanosecond timestamp of process start.
    started_at_ns: i64,
    /// Nanosecond timestamp of the last price write (0 = none this run).
    last_price_write_ns: AtomicI64,
    /// Number of summary computations served.
    summary_reads: AtomicU64,
}

impl HealthState {
    pub fn new(started_at_ns: i64) -> Self {
        Self {
            started_at_ns,
            last_price_write_ns: AtomicI64::new(0),
            summary_reads: AtomicU64::new(0),
        }
    }

    pub fn started_at_ns(&self) -> i64 {
        self.started_at_ns
    }

    pub fn mark_price_write(&self, ns: i64) {
        self.last_price_write_ns.store(ns, Ordering::Relaxed);
    }

    pub fn last_price_write_ns(&self) -> i64 {
        self.last_price_write_ns.load(Ordering::Relaxed)
    }

    pub fn inc_summary_reads(&self) {
        self.summary_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary_reads(&self) -> u64 {
        self.summary_reads.load(Ordering::Relaxed)
    }
}
