//! mpscq - Bounded Non-blocking Multi-Producer Single-Consumer Queue
//!
//! A fixed-capacity queue for handing work from many application threads to a
//! single consumer thread without ever blocking the producers. `offer` either
//! succeeds immediately or reports the queue full and hands the item back;
//! there is no internal retry, no spinning on behalf of the caller, and no
//! lock on the hot path.
//!
//! The implementation is an array-backed ring with per-slot sequence numbers:
//! producers claim a slot by advancing the shared tail with a CAS, then
//! publish the written slot by bumping its sequence. The single consumer reads
//! slots in order and recycles them for the next lap.
//!
//! # Example
//!
//! ```
//! use mpscq::MpscQueue;
//!
//! let queue = MpscQueue::with_capacity(8);
//!
//! assert!(queue.offer(42u64).is_ok());
//!
//! // Single consumer side
//! assert_eq!(queue.poll(), Some(42));
//! assert_eq!(queue.poll(), None);
//! ```

mod backoff;
mod invariants;
mod metrics;
mod queue;

pub use backoff::Backoff;
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::{MpscQueue, QueueFull};
