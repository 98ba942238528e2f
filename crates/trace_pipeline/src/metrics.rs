use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline-wide traffic counters.
///
/// Statistical only, hence `Ordering::Relaxed` throughout: nothing
/// coordinates through these values and stale reads are fine for
/// observability.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    published: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    flushes: AtomicU64,
    failed: AtomicU64,
}

impl PipelineMetrics {
    /// Traces accepted by `publish`.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Traces rejected by `publish` because the routed tier was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Traces transformed and handed to the dispatcher.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Dispatcher flushes performed (time-based and commanded).
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Events whose transform, dispatch, or flush failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn add_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}
