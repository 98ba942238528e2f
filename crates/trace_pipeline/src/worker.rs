//! The single consumer: priority-biased polling with bounded batch drains,
//! a hybrid spin-then-park idle strategy, and the time-based flush policy.

use crate::dispatch::{FailureMonitor, PayloadDispatcher, TraceTransform};
use crate::event::Event;
use crate::metrics::PipelineMetrics;
use crate::timer::Clock;
use mpscq::MpscQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Cap on how many events one batch drain consumes, bounding the time spent
/// catching up before the queues are re-prioritized.
const DRAIN_LIMIT: usize = 128;
/// Empty-poll yields before falling back to parking.
const EMPTY_POLLS: u32 = 50;
/// Park interval once spinning gave up.
const PARK_INTERVAL: Duration = Duration::from_millis(2);

/// State owned by the worker thread.
///
/// Built with the pipeline, moved into the thread at `start`.
pub(crate) struct TraceSerializer {
    primary: Arc<MpscQueue<Event>>,
    secondary: Arc<MpscQueue<Event>>,
    transform: Box<dyn TraceTransform>,
    dispatcher: Arc<dyn PayloadDispatcher>,
    monitor: Arc<dyn FailureMonitor>,
    metrics: Arc<PipelineMetrics>,
    clock: Arc<dyn Clock>,
    /// `None` disables time-based flushing entirely.
    flush_interval: Option<Duration>,
    last_flush_check: Duration,
    shutdown: Arc<AtomicBool>,
}

impl TraceSerializer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        primary: Arc<MpscQueue<Event>>,
        secondary: Arc<MpscQueue<Event>>,
        transform: Box<dyn TraceTransform>,
        dispatcher: Arc<dyn PayloadDispatcher>,
        monitor: Arc<dyn FailureMonitor>,
        metrics: Arc<PipelineMetrics>,
        clock: Arc<dyn Clock>,
        flush_interval: Option<Duration>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let last_flush_check = clock.now();
        Self {
            primary,
            secondary,
            transform,
            dispatcher,
            monitor,
            metrics,
            clock,
            flush_interval,
            last_flush_check,
            shutdown,
        }
    }

    /// The consumer loop.
    ///
    /// Cancellation is cooperative and observed between outer iterations
    /// only: an in-flight batch drain always completes before the thread
    /// exits. Exit is terminal for the pipeline instance.
    pub(crate) fn run(&mut self) {
        while !self.shutdown.load(Ordering::Acquire) {
            self.consume_from_primary();
        }
        info!("trace processing worker exited");
    }

    // An event from the primary queue is handled and a bounded batch drained
    // behind it, amortizing the catch-up after idle gaps. Only an empty
    // primary gives the secondary queue a turn, so sustained primary traffic
    // starves the secondary tier; that is the intended trade.
    fn consume_from_primary(&mut self) {
        let mut polls = EMPTY_POLLS;
        let primary = Arc::clone(&self.primary);
        loop {
            if let Some(event) = primary.poll() {
                self.on_event(event);
                self.consume_batch(&primary);
            } else if !self.consume_from_secondary() {
                if polls > 0 {
                    // Cheaper than parking for short gaps, kinder than a
                    // busy spin on low-core machines.
                    thread::yield_now();
                    polls -= 1;
                } else {
                    thread::park_timeout(PARK_INTERVAL);
                    return;
                }
            }
        }
    }

    fn consume_from_secondary(&mut self) -> bool {
        let secondary = Arc::clone(&self.secondary);
        if let Some(event) = secondary.poll() {
            self.on_event(event);
            self.consume_batch(&secondary);
            true
        } else {
            false
        }
    }

    fn consume_batch(&mut self, queue: &MpscQueue<Event>) {
        let limit = queue.len().min(DRAIN_LIMIT);
        queue.drain(|event| self.on_event(event), limit);
    }

    // An incomplete batch is emitted when
    // 1. a heartbeat arrives and the flush interval has elapsed (early
    //    heartbeats are ignored), or
    // 2. a synchronous flush command arrives (shutdown path).
    fn on_event(&mut self, event: Event) {
        match event {
            Event::Trace(mut trace) => {
                if let Err(error) = self.transform.on_trace_complete(&mut trace) {
                    debug!(%error, "error while processing trace");
                    self.metrics.add_failed();
                    self.monitor.on_failed_serialize(Some(&trace), &error);
                    return;
                }
                match self.dispatcher.add_trace(trace) {
                    Ok(()) => self.metrics.add_processed(),
                    Err(error) => {
                        debug!(%error, "error while dispatching trace");
                        self.metrics.add_failed();
                        self.monitor.on_failed_serialize(None, &error);
                    }
                }
            }
            Event::Heartbeat => {
                if self.should_flush() {
                    self.flush_dispatcher();
                }
            }
            Event::Flush(gate) => {
                // The gate stays closed when the flush fails, so the caller
                // observes a timeout rather than a false success.
                if self.flush_dispatcher() {
                    gate.fire();
                }
            }
        }
    }

    fn flush_dispatcher(&mut self) -> bool {
        match self.dispatcher.flush() {
            Ok(()) => {
                self.metrics.add_flush();
                true
            }
            Err(error) => {
                debug!(%error, "error while flushing dispatcher");
                self.metrics.add_failed();
                self.monitor.on_failed_serialize(None, &error);
                false
            }
        }
    }

    fn should_flush(&mut self) -> bool {
        if let Some(interval) = self.flush_interval {
            let now = self.clock.now();
            if now.saturating_sub(self.last_flush_check) >= interval {
                self.last_flush_check = now;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{NoopTransform, NullDispatcher, NullMonitor};
    use crate::event::FlushGate;
    use crate::timer::ManualClock;
    use crate::{ProcessingError, Span, Trace};

    fn serializer(
        dispatcher: Arc<NullDispatcher>,
        clock: Arc<ManualClock>,
        flush_interval: Option<Duration>,
    ) -> TraceSerializer {
        TraceSerializer::new(
            Arc::new(MpscQueue::with_capacity(8)),
            Arc::new(MpscQueue::with_capacity(8)),
            Box::new(NoopTransform),
            dispatcher,
            Arc::new(NullMonitor),
            Arc::new(PipelineMetrics::default()),
            clock,
            flush_interval,
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn trace() -> Trace {
        Trace::new(vec![Span::new(1, 1, 0, "svc", "op")])
    }

    #[test]
    fn heartbeat_flushes_only_after_interval() {
        let dispatcher = Arc::new(NullDispatcher::new());
        let clock = Arc::new(ManualClock::new());
        let mut worker = serializer(
            Arc::clone(&dispatcher),
            Arc::clone(&clock),
            Some(Duration::from_millis(100)),
        );

        worker.on_event(Event::Heartbeat);
        assert_eq!(dispatcher.flush_count(), 0, "early heartbeat ignored");

        clock.advance(Duration::from_millis(100));
        worker.on_event(Event::Heartbeat);
        assert_eq!(dispatcher.flush_count(), 1);

        // Interval restarts from the flush.
        worker.on_event(Event::Heartbeat);
        assert_eq!(dispatcher.flush_count(), 1);
    }

    #[test]
    fn zero_interval_disables_time_flush() {
        let dispatcher = Arc::new(NullDispatcher::new());
        let clock = Arc::new(ManualClock::new());
        let mut worker = serializer(Arc::clone(&dispatcher), Arc::clone(&clock), None);

        clock.advance(Duration::from_secs(3600));
        worker.on_event(Event::Heartbeat);
        assert_eq!(dispatcher.flush_count(), 0);
    }

    #[test]
    fn flush_command_flushes_and_fires_gate() {
        let dispatcher = Arc::new(NullDispatcher::new());
        let mut worker = serializer(Arc::clone(&dispatcher), Arc::new(ManualClock::new()), None);

        let gate = FlushGate::new();
        worker.on_event(Event::Flush(gate.clone()));
        assert_eq!(dispatcher.flush_count(), 1);
        assert!(gate.is_fired());
    }

    #[test]
    fn failing_transform_reports_and_keeps_going() {
        struct AlwaysFail;
        impl crate::dispatch::TraceTransform for AlwaysFail {
            fn on_trace_complete(&self, _trace: &mut Trace) -> Result<(), ProcessingError> {
                Err(ProcessingError::Transform("boom".into()))
            }
        }

        struct CountingMonitor(std::sync::atomic::AtomicU64);
        impl crate::dispatch::FailureMonitor for CountingMonitor {
            fn on_failed_serialize(&self, trace: Option<&Trace>, _error: &ProcessingError) {
                assert!(trace.is_some(), "transform failures keep the trace");
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dispatcher = Arc::new(NullDispatcher::new());
        let monitor = Arc::new(CountingMonitor(std::sync::atomic::AtomicU64::new(0)));
        let mut worker = TraceSerializer::new(
            Arc::new(MpscQueue::with_capacity(8)),
            Arc::new(MpscQueue::with_capacity(8)),
            Box::new(AlwaysFail),
            Arc::clone(&dispatcher) as Arc<dyn PayloadDispatcher>,
            Arc::clone(&monitor) as Arc<dyn FailureMonitor>,
            Arc::new(PipelineMetrics::default()),
            Arc::new(ManualClock::new()),
            None,
            Arc::new(AtomicBool::new(false)),
        );

        worker.on_event(Event::Trace(trace()));
        worker.on_event(Event::Trace(trace()));

        assert_eq!(monitor.0.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.trace_count(), 0);
        assert_eq!(worker.metrics.failed(), 2);
    }
}
