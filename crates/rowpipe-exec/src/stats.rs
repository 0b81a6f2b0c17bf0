//! Counters shared between pipeline threads and the reader.
//!
//! Keep this cheap: relaxed atomics only, read as an advisory snapshot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Tracks the high-water mark of a gauge.
#[derive(Default, Debug)]
pub struct PeakTracker {
    peak: AtomicUsize,
}

impl PeakTracker {
    /// Record a new observation; updates peak if higher.
    pub fn record(&self, value: usize) {
        let mut cur = self.peak.load(Ordering::Relaxed);
        while value > cur {
            match self
                .peak
                .compare_exchange(cur, value, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

#[derive(Default, Debug)]
pub struct FilterStats {
    rows_read: AtomicU64,
    rows_passed: AtomicU64,
    rows_filtered: AtomicU64,
    eval_errors: AtomicU64,
    buffered: PeakTracker,
}

impl FilterStats {
    pub fn record_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passed(&self) {
        self.rows_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.rows_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eval_error(&self) {
        self.eval_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_buffered(&self, len: usize) {
        self.buffered.record(len);
    }

    pub fn snapshot(&self) -> FilterStatsSnapshot {
        FilterStatsSnapshot {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_passed: self.rows_passed.load(Ordering::Relaxed),
            rows_filtered: self.rows_filtered.load(Ordering::Relaxed),
            eval_errors: self.eval_errors.load(Ordering::Relaxed),
            peak_buffered: self.buffered.peak(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FilterStatsSnapshot {
    /// Rows pulled from upstream by the feeder.
    pub rows_read: u64,
    /// Rows the predicate accepted (evaluated, not necessarily delivered yet).
    pub rows_passed: u64,
    pub rows_filtered: u64,
    pub eval_errors: u64,
    /// High-water mark of the reorder buffer.
    pub peak_buffered: usize,
}
