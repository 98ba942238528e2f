//! Debug assertion macros for queue invariants.
//!
//! Active only in debug builds (`debug_assert!`), so release builds carry no
//! overhead. Used by `MpscQueue<T>`.

/// Assert that occupancy never exceeds capacity.
///
/// **Invariant**: `0 <= (tail - head) <= capacity`
///
/// Used in: `len()` and the consumer paths after computing occupancy.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded-count violated: occupancy {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that a sequence counter only moves forward.
///
/// **Invariant**: head and tail are monotonically non-decreasing.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "monotonicity violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// Assert that the slot being consumed was published for exactly this lap.
///
/// **Invariant**: a slot at position `p` is readable iff its sequence equals
/// `p + 1`. With a single consumer, any larger value means a protocol bug.
macro_rules! debug_assert_slot_ready {
    ($seq:expr, $pos:expr) => {
        debug_assert!(
            $seq == $pos.wrapping_add(1),
            "slot-sequence violated: slot at position {} has sequence {}",
            $pos,
            $seq
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_slot_ready;
