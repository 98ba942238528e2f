//! Property-based tests for `MpscQueue` invariants.
//!
//! Coverage:
//! - bounded occupancy: `len() <= capacity()` after any operation sequence
//! - FIFO: items come out in offer order (single producer)
//! - conservation: accepted items = consumed items + items still queued

use mpscq::MpscQueue;
use proptest::prelude::*;

proptest! {
    /// Occupancy never exceeds capacity, whatever the interleaving of
    /// offers and polls.
    #[test]
    fn bounded_occupancy(
        capacity in 1usize..64,
        ops in proptest::collection::vec(any::<bool>(), 0..400),
    ) {
        let queue = MpscQueue::with_capacity(capacity);
        let capacity = queue.capacity();

        for (i, is_offer) in ops.into_iter().enumerate() {
            if is_offer {
                let _ = queue.offer(i as u64);
            } else {
                let _ = queue.poll();
            }
            prop_assert!(queue.len() <= capacity,
                "occupancy {} exceeds capacity {}", queue.len(), capacity);
            prop_assert!(queue.remaining() <= capacity);
        }
    }

    /// Accepted items are consumed in offer order with nothing lost,
    /// duplicated, or reordered.
    #[test]
    fn fifo_and_conservation(
        capacity in 1usize..32,
        offers in 0usize..200,
    ) {
        let queue = MpscQueue::with_capacity(capacity);

        let mut accepted = Vec::new();
        for i in 0..offers as u64 {
            if queue.offer(i).is_ok() {
                accepted.push(i);
            }
        }
        prop_assert!(accepted.len() <= queue.capacity());

        let mut consumed = Vec::new();
        queue.drain(|item| consumed.push(item), usize::MAX);

        prop_assert_eq!(&consumed, &accepted);
        prop_assert!(queue.is_empty());
    }

    /// Interleaved offer/drain batches preserve FIFO across laps.
    #[test]
    fn fifo_across_laps(
        capacity in 1usize..16,
        rounds in 1usize..50,
        batch in 1usize..8,
    ) {
        let queue = MpscQueue::with_capacity(capacity);
        let mut next_in = 0u64;
        let mut consumed = Vec::new();

        for _ in 0..rounds {
            for _ in 0..batch {
                if queue.offer(next_in).is_ok() {
                    next_in += 1;
                }
            }
            queue.drain(|item| consumed.push(item), batch);
        }
        queue.drain(|item| consumed.push(item), usize::MAX);

        let expected: Vec<u64> = (0..next_in).collect();
        prop_assert_eq!(consumed, expected);
    }
}
