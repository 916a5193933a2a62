use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for one port. Always on; each counter lives on its own
/// cache line so producers and consumers do not contend through them.
#[derive(Debug, Default)]
pub(crate) struct PortCounters {
    queued: CachePadded<AtomicU64>,
    delivered: CachePadded<AtomicU64>,
    overflow_dropped: CachePadded<AtomicU64>,
}

impl PortCounters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_queued(&self, n: u64) {
        self.queued.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_delivered(&self, n: u64) {
        self.delivered.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_overflow_dropped(&self, n: u64) {
        self.overflow_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values for a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Packets accepted into the ring (user and io).
    pub queued: u64,
    /// Packets handed to waiters.
    pub delivered: u64,
    /// Binding transitions dropped on a full ring.
    pub overflow_dropped: u64,
}
