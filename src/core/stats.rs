//! Dispatcher statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::admission::CapacitySnapshot;

/// Point-in-time view of dispatcher activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Number of dispatch threads.
    pub worker_count: usize,
    /// Sources registered so far.
    pub registered_sources: u64,
    /// Execution ticket ceiling.
    pub capacity_total: usize,
    /// Tickets held by running handlers.
    pub capacity_busy: usize,
    /// Handler invocations completed.
    pub events_handled: u64,
    /// Times a thread found no capacity and had to wait.
    pub capacity_retries: u64,
    /// Readiness reports whose notification had already been drained.
    pub spurious_wakeups: u64,
    /// Handler invocations that panicked.
    pub handler_panics: u64,
}

/// Lock-free counters behind [`DispatchStats`].
#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    pub registered_sources: AtomicU64,
    pub events_handled: AtomicU64,
    pub capacity_retries: AtomicU64,
    pub spurious_wakeups: AtomicU64,
    pub handler_panics: AtomicU64,
}

impl DispatchCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, worker_count: usize, capacity: CapacitySnapshot) -> DispatchStats {
        DispatchStats {
            worker_count,
            registered_sources: self.registered_sources.load(Ordering::Relaxed),
            capacity_total: capacity.total,
            capacity_busy: capacity.busy,
            events_handled: self.events_handled.load(Ordering::Relaxed),
            capacity_retries: self.capacity_retries.load(Ordering::Relaxed),
            spurious_wakeups: self.spurious_wakeups.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = DispatchCounters::default();
        DispatchCounters::bump(&counters.events_handled);
        DispatchCounters::bump(&counters.events_handled);
        DispatchCounters::bump(&counters.registered_sources);

        let stats = counters.snapshot(4, CapacitySnapshot { total: 129, busy: 1 });
        assert_eq!(stats.worker_count, 4);
        assert_eq!(stats.events_handled, 2);
        assert_eq!(stats.registered_sources, 1);
        assert_eq!(stats.capacity_total, 129);
        assert_eq!(stats.capacity_busy, 1);
        assert_eq!(stats.handler_panics, 0);
    }
}
