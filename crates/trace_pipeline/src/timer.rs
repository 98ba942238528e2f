//! Time sources and fixed-rate scheduling.
//!
//! Both are injected dependencies owned by the pipeline, not process-wide
//! singletons: tests swap in [`ManualClock`] and [`ManualScheduler`] to drive
//! time and heartbeats by hand.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source for the worker's flush policy.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// The system's monotonic clock.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock: time moves only via [`advance`](Self::advance).
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Fixed-rate task scheduling.
pub trait Scheduler: Send + Sync {
    /// Runs `task` repeatedly with `period` between invocations until the
    /// returned handle is cancelled.
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        task: Box<dyn Fn() + Send + Sync>,
    ) -> ScheduledTask;
}

/// Cancellable handle for a scheduled task.
///
/// Dropping the handle cancels the task.
pub struct ScheduledTask {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ScheduledTask {
    /// Stops the task and waits for any backing thread to exit.
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Default scheduler: one dedicated timer thread per task.
#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        task: Box<dyn Fn() + Send + Sync>,
    ) -> ScheduledTask {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("pipeline-timer".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    thread::park_timeout(period);
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                    task();
                }
            })
            .expect("failed to spawn timer thread");
        ScheduledTask {
            stop,
            handle: Some(handle),
        }
    }
}

/// Test scheduler: tasks run only when [`tick`](Self::tick) is called.
#[derive(Default)]
pub struct ManualScheduler {
    #[allow(clippy::type_complexity)]
    tasks: Mutex<Vec<(Arc<AtomicBool>, Box<dyn Fn() + Send + Sync>)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every still-scheduled task once.
    pub fn tick(&self) {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for (stop, task) in tasks.iter() {
            if !stop.load(Ordering::Acquire) {
                task();
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_at_fixed_rate(
        &self,
        _period: Duration,
        task: Box<dyn Fn() + Send + Sync>,
    ) -> ScheduledTask {
        let stop = Arc::new(AtomicBool::new(false));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Arc::clone(&stop), task));
        ScheduledTask { stop, handle: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn manual_clock_advances_on_demand() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(250));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn manual_scheduler_runs_tasks_on_tick_until_cancelled() {
        let scheduler = ManualScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = Arc::clone(&runs);
        let mut task = scheduler.schedule_at_fixed_rate(
            Duration::from_secs(1),
            Box::new(move || {
                task_runs.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.tick();
        scheduler.tick();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        task.cancel();
        scheduler.tick();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn thread_scheduler_fires_and_cancels() {
        let scheduler = ThreadScheduler;
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = Arc::clone(&runs);
        let mut task = scheduler.schedule_at_fixed_rate(
            Duration::from_millis(5),
            Box::new(move || {
                task_runs.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let deadline = Instant::now() + Duration::from_secs(2);
        while runs.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(runs.load(Ordering::SeqCst) > 0, "task never fired");

        task.cancel();
        let after_cancel = runs.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(25));
        assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
    }
}
