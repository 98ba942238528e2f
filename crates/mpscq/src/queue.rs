use crate::invariants::{
    debug_assert_bounded_count, debug_assert_monotonic, debug_assert_slot_ready,
};
use crate::QueueMetrics;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// SYNCHRONIZATION PROTOCOL
// =============================================================================
//
// Each slot carries its own sequence number, initialized to the slot's index.
// The counters `tail` (shared by producers) and `head` (consumer-only) run
// unbounded; the buffer index is `position & mask`.
//
// Producer protocol for position `p`:
// 1. Load slot sequence with Acquire. `seq == p` means the slot is free for
//    this lap; `seq < p` means the consumer has not recycled it yet (full).
// 2. Claim `p` by CAS on `tail` (Relaxed on both sides - the slot sequence,
//    not the tail counter, carries the data-visibility edge).
// 3. Write the value, then store `seq = p + 1` with Release to publish it.
//
// Consumer protocol for position `p`:
// 1. Load slot sequence with Acquire. `seq == p + 1` means published;
//    anything smaller means empty (or a producer mid-write).
// 2. Move the value out, then store `seq = p + capacity` with Release to
//    recycle the slot for the next lap.
// 3. Advance `head`. Only the consumer writes `head`, so no CAS is needed.
//
// A claimed-but-unpublished slot makes `poll` return None even though `len`
// counts it; all size figures are approximate by contract.
//
// =============================================================================

/// Error returned by [`MpscQueue::offer`] when the queue is full.
///
/// Carries the rejected item back to the caller, so retry loops keep
/// ownership instead of losing the value to a failed attempt. Trait impls
/// are manual to stay free of `T` bounds, like the std channel errors.
pub struct QueueFull<T>(pub T);

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueFull").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded, non-blocking multi-producer single-consumer queue.
///
/// Any thread may call [`offer`](Self::offer) concurrently; `poll`/`drain`
/// must only ever be called from one consumer thread at a time. The queue
/// never blocks a producer: a full queue rejects the item immediately.
pub struct MpscQueue<T> {
    /// Next position producers will claim.
    tail: CachePadded<AtomicUsize>,
    /// Next position the consumer will read.
    head: CachePadded<AtomicUsize>,
    slots: Box<[Slot<T>]>,
    mask: usize,
    metrics: QueueMetrics,
}

// Safety: values move through the queue under the slot-sequence protocol
// above; a slot is never read and written concurrently.
unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    /// Creates a queue with room for at least `capacity` items.
    ///
    /// Capacity is rounded up to the next power of two (minimum 2) so index
    /// wrapping stays a mask operation; [`capacity`](Self::capacity) reports
    /// the rounded figure.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();

        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            slots.push(Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            });
        }

        Self {
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            metrics: QueueMetrics::new(),
        }
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of items currently queued.
    ///
    /// Counts claimed-but-unpublished slots; safe to call from any thread.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head).min(self.capacity())
    }

    /// Approximate free space.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Returns true if no items are visible.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Traffic counters for this queue.
    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Attempts to enqueue `item` without blocking.
    ///
    /// Returns `Err(QueueFull(item))` immediately when the queue is full -
    /// no retry, no spin-wait on the consumer. May be called from any number
    /// of threads concurrently.
    pub fn offer(&self, item: T) -> Result<(), QueueFull<T>> {
        let mut tail = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[tail & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let lag = seq as isize - tail as isize;

            if lag == 0 {
                // Slot free for this lap; claim the position.
                match self.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS above made this thread the unique
                        // owner of `slot` for this lap. The consumer will not
                        // touch it until the Release store below publishes
                        // sequence = tail + 1.
                        unsafe { (*slot.value.get()).write(item) };
                        slot.sequence.store(tail.wrapping_add(1), Ordering::Release);
                        self.metrics.add_offer();
                        return Ok(());
                    }
                    Err(current) => tail = current,
                }
            } else if lag < 0 {
                // Consumer has not recycled this slot: a full lap behind.
                self.metrics.add_rejection();
                return Err(QueueFull(item));
            } else {
                // Another producer claimed this position; reload and retry.
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    // ---------------------------------------------------------------------
    // CONSUMER API (single thread only)
    // ---------------------------------------------------------------------

    /// Dequeues one item if one is published.
    ///
    /// Must only be called from the single consumer thread.
    pub fn poll(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let slot = &self.slots[head & self.mask];
        let seq = slot.sequence.load(Ordering::Acquire);

        if (seq as isize - head.wrapping_add(1) as isize) < 0 {
            // Empty, or a producer claimed the slot but has not published yet.
            return None;
        }
        debug_assert_slot_ready!(seq, head);

        // SAFETY: sequence == head + 1 means the producer's Release store
        // published a fully written value, and this is the only consumer.
        let item = unsafe { (*slot.value.get()).assume_init_read() };

        // Recycle the slot for the next lap, then advance.
        slot.sequence
            .store(head.wrapping_add(self.capacity()), Ordering::Release);
        let new_head = head.wrapping_add(1);
        debug_assert_monotonic!("head", head, new_head);
        self.head.store(new_head, Ordering::Release);

        self.metrics.add_polls(1);
        Some(item)
    }

    /// Consumes up to `max` already-published items, applying `f` to each.
    ///
    /// Returns the number consumed. Stops early at the first gap rather than
    /// waiting for slow producers. Must only be called from the single
    /// consumer thread.
    pub fn drain<F>(&self, mut f: F, max: usize) -> usize
    where
        F: FnMut(T),
    {
        let mut count = 0;
        while count < max {
            match self.poll() {
                Some(item) => {
                    f(item);
                    count += 1;
                }
                None => break,
            }
        }
        debug_assert_bounded_count!(count, self.capacity());
        count
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        // Drop whatever was published but never consumed.
        while self.poll().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_then_poll_fifo() {
        let queue = MpscQueue::with_capacity(8);
        for i in 0..5u64 {
            assert!(queue.offer(i).is_ok());
        }
        for i in 0..5u64 {
            assert_eq!(queue.poll(), Some(i));
        }
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn full_queue_rejects_and_returns_item() {
        let queue = MpscQueue::with_capacity(4);
        for i in 0..4u64 {
            assert!(queue.offer(i).is_ok());
        }
        let err = queue.offer(99).unwrap_err();
        assert_eq!(err.0, 99);
        assert_eq!(queue.len(), 4);

        // Consuming one frees one slot.
        assert_eq!(queue.poll(), Some(0));
        assert!(queue.offer(99).is_ok());
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(MpscQueue::<u8>::with_capacity(5).capacity(), 8);
        assert_eq!(MpscQueue::<u8>::with_capacity(8).capacity(), 8);
        assert_eq!(MpscQueue::<u8>::with_capacity(0).capacity(), 2);
    }

    #[test]
    fn drain_respects_limit() {
        let queue = MpscQueue::with_capacity(16);
        for i in 0..10u64 {
            queue.offer(i).unwrap();
        }

        let mut seen = Vec::new();
        let consumed = queue.drain(|item| seen.push(item), 4);
        assert_eq!(consumed, 4);
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(queue.len(), 6);

        let consumed = queue.drain(|item| seen.push(item), 100);
        assert_eq!(consumed, 6);
        assert_eq!(seen.len(), 10);
        assert!(queue.is_empty());
    }

    #[test]
    fn wraps_across_many_laps() {
        let queue = MpscQueue::with_capacity(4);
        for i in 0..100u64 {
            queue.offer(i).unwrap();
            assert_eq!(queue.poll(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn metrics_count_traffic() {
        let queue = MpscQueue::with_capacity(2);
        queue.offer(1u8).unwrap();
        queue.offer(2u8).unwrap();
        assert!(queue.offer(3u8).is_err());
        queue.poll();

        let m = queue.metrics().snapshot();
        assert_eq!(m.offers, 2);
        assert_eq!(m.rejections, 1);
        assert_eq!(m.polls, 1);
    }

    #[test]
    fn drop_releases_leftover_items() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let queue = MpscQueue::with_capacity(8);
            for _ in 0..5 {
                queue.offer(Tracked(Arc::clone(&drops))).unwrap();
            }
            assert!(queue.poll().is_some());
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }
}
