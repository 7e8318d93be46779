//! Coordinator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of coordinator activity since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeferralStats {
    pub deferred: u64,
    pub dispatched_immediately: u64,
    pub dispatched_after_commit: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub dispatch_failures: u64,
    /// Jobs currently waiting on open transactions
    pub pending: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    deferred: AtomicU64,
    dispatched_immediately: AtomicU64,
    dispatched_after_commit: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    dispatch_failures: AtomicU64,
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum Counter {
    Deferred,
    DispatchedImmediately,
    DispatchedAfterCommit,
    Dropped,
    Rejected,
    DispatchFailure,
}

impl StatsCounters {
    pub(crate) fn incr(&self, counter: Counter) {
        let cell = match counter {
            Counter::Deferred => &self.deferred,
            Counter::DispatchedImmediately => &self.dispatched_immediately,
            Counter::DispatchedAfterCommit => &self.dispatched_after_commit,
            Counter::Dropped => &self.dropped,
            Counter::Rejected => &self.rejected,
            Counter::DispatchFailure => &self.dispatch_failures,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, pending: usize) -> DeferralStats {
        DeferralStats {
            deferred: self.deferred.load(Ordering::Relaxed),
            dispatched_immediately: self.dispatched_immediately.load(Ordering::Relaxed),
            dispatched_after_commit: self.dispatched_after_commit.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            pending,
        }
    }
}
