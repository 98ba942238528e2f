use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for queue traffic.
///
/// All accesses use `Ordering::Relaxed` because these are purely statistical:
/// no control flow depends on them being up to date, slightly stale reads are
/// acceptable for observability, and they guard no other data. Relaxed avoids
/// memory barriers on the offer/poll hot paths.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    offers: AtomicU64,
    rejections: AtomicU64,
    polls: AtomicU64,
}

impl QueueMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_offer(&self) {
        self.offers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_polls(&self, n: u64) {
        self.polls.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            offers: self.offers.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
        }
    }
}

/// A consistent-enough snapshot of [`QueueMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    /// Items accepted by `offer`.
    pub offers: u64,
    /// Items rejected because the queue was full.
    pub rejections: u64,
    /// Items handed to the consumer via `poll`/`drain`.
    pub polls: u64,
}
