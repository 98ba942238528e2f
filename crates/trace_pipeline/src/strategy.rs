use crate::event::Event;
use crate::Trace;
use mpscq::MpscQueue;
use std::sync::Arc;

/// Strategy variant the pipeline routes published traces with, selected at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prioritization {
    /// Two tiers: priorities above the configured threshold take the
    /// guaranteed-attempt primary queue, everything else the best-effort
    /// secondary queue.
    FastLane,
    /// Pure FIFO: everything through the primary queue, secondary unused.
    SingleLane,
}

impl Prioritization {
    pub(crate) fn create(
        self,
        primary: Arc<MpscQueue<Event>>,
        secondary: Arc<MpscQueue<Event>>,
        threshold: i32,
    ) -> Box<dyn PrioritizationStrategy> {
        match self {
            Prioritization::FastLane => Box::new(FastLaneStrategy {
                primary,
                secondary,
                threshold,
            }),
            Prioritization::SingleLane => Box::new(SingleLaneStrategy { primary }),
        }
    }
}

/// Routes one published trace to a queue tier.
///
/// Called from arbitrary application threads: implementations must return in
/// bounded, allocation-light time no matter how full the queues are, and
/// must never block or retry on the caller's behalf.
pub trait PrioritizationStrategy: Send + Sync {
    /// Returns the underlying `offer` result: false means the trace was
    /// dropped, and it is the caller's business to count or react.
    fn publish(&self, priority: i32, trace: Trace) -> bool;
}

struct FastLaneStrategy {
    primary: Arc<MpscQueue<Event>>,
    secondary: Arc<MpscQueue<Event>>,
    threshold: i32,
}

impl PrioritizationStrategy for FastLaneStrategy {
    fn publish(&self, priority: i32, trace: Trace) -> bool {
        let queue = if priority > self.threshold {
            &self.primary
        } else {
            &self.secondary
        };
        queue.offer(Event::Trace(trace)).is_ok()
    }
}

struct SingleLaneStrategy {
    primary: Arc<MpscQueue<Event>>,
}

impl PrioritizationStrategy for SingleLaneStrategy {
    fn publish(&self, _priority: i32, trace: Trace) -> bool {
        self.primary.offer(Event::Trace(trace)).is_ok()
    }
}
