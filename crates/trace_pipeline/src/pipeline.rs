//! Public pipeline surface: construction, lifecycle, publish, and flush.

use crate::dispatch::{FailureMonitor, PayloadDispatcher, TraceTransform};
use crate::event::{Event, FlushGate};
use crate::metrics::PipelineMetrics;
use crate::strategy::{Prioritization, PrioritizationStrategy};
use crate::timer::{Clock, MonotonicClock, ScheduledTask, Scheduler, ThreadScheduler};
use crate::worker::TraceSerializer;
use crate::{PipelineError, Trace};
use mpscq::{Backoff, MpscQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Configuration for [`TracePipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each queue tier; rounded up to a power of two.
    pub capacity: usize,
    /// How much time between flush opportunities must elapse before the
    /// worker flushes the dispatcher. Zero disables time-based flushing.
    pub flush_interval: Duration,
    /// Inject periodic heartbeats so time-based flushes still happen under
    /// zero traffic.
    pub heartbeat: bool,
    /// Heartbeat injection period.
    pub heartbeat_period: Duration,
    /// Routing strategy for published traces.
    pub prioritization: Prioritization,
    /// Priorities above this route to the primary tier (two-tier strategy
    /// only).
    pub priority_threshold: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            flush_interval: Duration::from_secs(1),
            heartbeat: true,
            heartbeat_period: Duration::from_millis(1000),
            prioritization: Prioritization::FastLane,
            priority_threshold: 0,
        }
    }
}

impl PipelineConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat = enabled;
        self
    }

    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    pub fn with_prioritization(mut self, prioritization: Prioritization) -> Self {
        self.prioritization = prioritization;
        self
    }

    pub fn with_priority_threshold(mut self, threshold: i32) -> Self {
        self.priority_threshold = threshold;
        self
    }
}

/// Bounded, non-blocking trace-processing pipeline.
///
/// Producers publish completed traces from any thread; one dedicated worker
/// consumes, post-processes, and hands them to the payload dispatcher.
/// Producers are never blocked: a full tier drops the trace and `publish`
/// says so.
///
/// A pipeline instance is single-use: once [`close`](Self::close) has run,
/// the worker is gone for good and a fresh instance must be built to resume
/// processing.
pub struct TracePipeline {
    primary: Arc<MpscQueue<Event>>,
    secondary: Arc<MpscQueue<Event>>,
    strategy: Box<dyn PrioritizationStrategy>,
    metrics: Arc<PipelineMetrics>,
    shutdown: Arc<AtomicBool>,
    scheduler: Arc<dyn Scheduler>,
    heartbeat_period: Duration,
    do_heartbeat: bool,
    serializer: Mutex<Option<TraceSerializer>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    heartbeat_task: Mutex<Option<ScheduledTask>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl TracePipeline {
    /// Builds a pipeline with the system clock and a thread-backed timer.
    pub fn new(
        config: PipelineConfig,
        transform: Box<dyn TraceTransform>,
        dispatcher: Arc<dyn PayloadDispatcher>,
        monitor: Arc<dyn FailureMonitor>,
    ) -> Self {
        Self::with_time_sources(
            config,
            transform,
            dispatcher,
            monitor,
            Arc::new(MonotonicClock::new()),
            Arc::new(ThreadScheduler),
        )
    }

    /// Builds a pipeline with injected time sources, for tests and embedders
    /// that own their timers.
    pub fn with_time_sources(
        config: PipelineConfig,
        transform: Box<dyn TraceTransform>,
        dispatcher: Arc<dyn PayloadDispatcher>,
        monitor: Arc<dyn FailureMonitor>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let primary = Arc::new(MpscQueue::with_capacity(config.capacity));
        let secondary = Arc::new(MpscQueue::with_capacity(config.capacity));
        let strategy = config.prioritization.create(
            Arc::clone(&primary),
            Arc::clone(&secondary),
            config.priority_threshold,
        );
        let metrics = Arc::new(PipelineMetrics::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let flush_interval = (!config.flush_interval.is_zero()).then_some(config.flush_interval);

        let serializer = TraceSerializer::new(
            Arc::clone(&primary),
            Arc::clone(&secondary),
            transform,
            dispatcher,
            monitor,
            Arc::clone(&metrics),
            clock,
            flush_interval,
            Arc::clone(&shutdown),
        );

        Self {
            primary,
            secondary,
            strategy,
            metrics,
            shutdown,
            scheduler,
            heartbeat_period: config.heartbeat_period,
            do_heartbeat: config.heartbeat,
            serializer: Mutex::new(Some(serializer)),
            worker: Mutex::new(None),
            heartbeat_task: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Spawns the worker thread and, if enabled, the heartbeat timer.
    pub fn start(&self) -> Result<(), PipelineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::Closed);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::AlreadyStarted);
        }

        let mut serializer = lock(&self.serializer)
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;

        if self.do_heartbeat {
            // A steady stream of heartbeats keeps flushes timely when
            // throughput is too low to ever fill a batch.
            let primary = Arc::clone(&self.primary);
            let shutdown = Arc::clone(&self.shutdown);
            let task = self.scheduler.schedule_at_fixed_rate(
                self.heartbeat_period,
                Box::new(move || heartbeat(&primary, &shutdown)),
            );
            *lock(&self.heartbeat_task) = Some(task);
        }

        let handle = thread::Builder::new()
            .name("trace-processor".into())
            .spawn(move || serializer.run())
            .map_err(|e| PipelineError::Spawn(e.to_string()))?;
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    /// Routes a completed trace to a queue tier. Non-blocking; false means
    /// the trace was dropped.
    pub fn publish(&self, priority: i32, trace: Trace) -> bool {
        let accepted = self.strategy.publish(priority, trace);
        if accepted {
            self.metrics.add_published();
        } else {
            self.metrics.add_dropped();
        }
        accepted
    }

    /// Forces a dispatcher flush and blocks the calling thread until the
    /// worker has performed it, up to `timeout`.
    ///
    /// The command is enqueued on the primary tier behind every trace already
    /// accepted there, so those traces reach the dispatcher before the flush
    /// runs. Returns false if the worker did not complete the flush in time.
    /// The enqueue itself retries until accepted, so a full primary queue
    /// with no running worker keeps this call spinning; pair with sensible
    /// timeouts during shutdown sequencing.
    pub fn flush(&self, timeout: Duration) -> bool {
        let gate = FlushGate::new();
        let mut event = Event::Flush(gate.clone());
        let mut backoff = Backoff::new();
        loop {
            match self.primary.offer(event) {
                Ok(()) => break,
                Err(rejected) => {
                    event = rejected.0;
                    backoff.snooze();
                }
            }
        }
        gate.await_fired(timeout)
    }

    /// Stops the heartbeat timer and the worker thread.
    ///
    /// The worker observes the stop request between iterations, so a batch
    /// being drained completes first: graceful, not latency-bounded.
    /// Closing is terminal and idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Raise the flag before cancelling the timer: a heartbeat stuck
        // retrying against a full queue only gives up once it sees it.
        self.shutdown.store(true, Ordering::Release);
        if let Some(mut task) = lock(&self.heartbeat_task).take() {
            task.cancel();
        }
        if let Some(handle) = lock(&self.worker).take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }

    /// Capacity of the primary queue.
    ///
    /// Only the primary tier is advertised, it being the guaranteed-attempt
    /// path.
    pub fn capacity(&self) -> usize {
        self.primary.capacity()
    }

    /// Approximate free space in the primary queue.
    pub fn remaining_capacity(&self) -> usize {
        self.primary.remaining()
    }

    /// Traffic counters for this pipeline.
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}

impl Drop for TracePipeline {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pushes one heartbeat onto the primary queue, retrying until accepted.
///
/// Backing off without giving up matters: with tiny traces a queue can take a
/// long while to fill, and skipped heartbeats would starve the time-based
/// flush. Only shutdown abandons the attempt.
fn heartbeat(primary: &MpscQueue<Event>, shutdown: &AtomicBool) {
    let mut backoff = Backoff::new();
    while !shutdown.load(Ordering::Acquire) {
        match primary.offer(Event::Heartbeat) {
            Ok(()) => return,
            Err(_) => backoff.snooze(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
