use crate::Trace;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// An entry flowing through the pipeline queues.
///
/// An explicit tagged union rather than in-band sentinel values, so a
/// genuinely empty trace can never be mistaken for a control marker.
#[derive(Debug)]
pub enum Event {
    /// A completed trace to post-process and dispatch.
    Trace(Trace),
    /// Wakes the worker so the time-based flush policy gets a chance to run
    /// even under zero traffic. Carries no payload.
    Heartbeat,
    /// Forces a dispatcher flush; the gate fires once the flush has run.
    Flush(FlushGate),
}

/// One-shot completion gate with a single count.
///
/// The flush caller waits on the gate while the worker fires it after
/// performing the flush. Cloning shares the same gate; firing is effective
/// exactly once.
#[derive(Debug, Clone)]
pub struct FlushGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl FlushGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                fired: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Opens the gate and wakes all waiters. Later calls are no-ops.
    pub fn fire(&self) {
        let mut fired = self
            .inner
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*fired {
            *fired = true;
            self.inner.cond.notify_all();
        }
    }

    /// Blocks the calling thread until the gate fires or `timeout` elapses.
    ///
    /// Returns true if the gate fired in time. A zero timeout only checks
    /// the current state.
    pub fn await_fired(&self, timeout: Duration) -> bool {
        let fired = self
            .inner
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (fired, _timed_out) = self
            .inner
            .cond
            .wait_timeout_while(fired, timeout, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
        *fired
    }

    /// True once [`fire`](Self::fire) has run.
    pub fn is_fired(&self) -> bool {
        *self
            .inner
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FlushGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn unfired_gate_times_out() {
        let gate = FlushGate::new();
        assert!(!gate.is_fired());
        assert!(!gate.await_fired(Duration::ZERO));
        assert!(!gate.await_fired(Duration::from_millis(10)));
    }

    #[test]
    fn fired_gate_releases_waiter() {
        let gate = FlushGate::new();
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.await_fired(Duration::from_secs(5)))
        };
        gate.fire();
        assert!(waiter.join().unwrap());
        assert!(gate.is_fired());

        // Firing again changes nothing.
        gate.fire();
        assert!(gate.await_fired(Duration::ZERO));
    }

    #[test]
    fn clones_share_one_gate() {
        let gate = FlushGate::new();
        let other = gate.clone();
        other.fire();
        assert!(gate.is_fired());
    }
}
