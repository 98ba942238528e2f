//! Collaborator seams: post-processing, payload dispatch, and failure
//! monitoring.
//!
//! The pipeline invokes all three only from its single worker thread, so
//! implementations need no internal synchronization for that traffic; the
//! bundled reference implementations synchronize anyway because embedders
//! commonly share them with other subsystems.

use crate::{ProcessingError, Trace};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Post-processing applied to each completed trace before dispatch.
pub trait TraceTransform: Send {
    /// Adjusts the trace in place: rule application, sampling-metric
    /// annotation, and the like. An `Err` drops the trace and reports it to
    /// the failure monitor; the worker keeps running either way.
    fn on_trace_complete(&self, trace: &mut Trace) -> Result<(), ProcessingError>;
}

/// Buffers transformed traces for batched shipment to a remote collector.
///
/// Must not block indefinitely; how it batches and serializes is its own
/// business.
pub trait PayloadDispatcher: Send + Sync {
    /// Accepts one transformed trace for eventual shipment.
    fn add_trace(&self, trace: Trace) -> Result<(), ProcessingError>;

    /// Emits whatever is buffered, regardless of batch fullness. Returns
    /// once emission is triggered, not necessarily once delivered.
    fn flush(&self) -> Result<(), ProcessingError>;
}

/// Observability hook for per-event processing failures.
pub trait FailureMonitor: Send + Sync {
    /// Called once per failed event. `trace` is present when the worker
    /// still owned the trace at the point of failure.
    fn on_failed_serialize(&self, trace: Option<&Trace>, error: &ProcessingError);
}

/// Transform that passes traces through untouched.
#[derive(Debug, Default)]
pub struct NoopTransform;

impl TraceTransform for NoopTransform {
    fn on_trace_complete(&self, _trace: &mut Trace) -> Result<(), ProcessingError> {
        Ok(())
    }
}

/// Transform that stamps a fixed sample rate on the root span.
#[derive(Debug)]
pub struct SampleRateTransform {
    rate: f64,
}

impl SampleRateTransform {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl TraceTransform for SampleRateTransform {
    fn on_trace_complete(&self, trace: &mut Trace) -> Result<(), ProcessingError> {
        if let Some(root) = trace.root_mut() {
            root.set_metric("_sample_rate", self.rate);
        }
        Ok(())
    }
}

/// Dispatcher that counts and discards. Useful as a sink in tests and when
/// shipping is disabled.
#[derive(Debug, Default)]
pub struct NullDispatcher {
    traces: AtomicU64,
    flushes: AtomicU64,
}

impl NullDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace_count(&self) -> u64 {
        self.traces.load(Ordering::Relaxed)
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl PayloadDispatcher for NullDispatcher {
    fn add_trace(&self, _trace: Trace) -> Result<(), ProcessingError> {
        self.traces.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> Result<(), ProcessingError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Dispatcher that buffers traces and writes them as JSON lines on flush.
///
/// A local stand-in for the real network shipment path; handy for demos and
/// offline capture.
pub struct JsonLinesDispatcher<W: Write + Send> {
    buffer: Mutex<Vec<Trace>>,
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesDispatcher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            writer: Mutex::new(writer),
        }
    }

    /// Number of traces accepted but not yet flushed.
    pub fn buffered(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<W: Write + Send> PayloadDispatcher for JsonLinesDispatcher<W> {
    fn add_trace(&self, trace: Trace) -> Result<(), ProcessingError> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(trace);
        Ok(())
    }

    fn flush(&self) -> Result<(), ProcessingError> {
        let traces: Vec<Trace> = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for trace in traces {
            let line = serde_json::to_string(&trace)?;
            writeln!(writer, "{line}").map_err(|e| ProcessingError::Transport(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| ProcessingError::Transport(e.to_string()))
    }
}

/// Monitor that swallows reports.
#[derive(Debug, Default)]
pub struct NullMonitor;

impl FailureMonitor for NullMonitor {
    fn on_failed_serialize(&self, _trace: Option<&Trace>, _error: &ProcessingError) {}
}

/// Monitor that logs each failure through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingMonitor;

impl FailureMonitor for LoggingMonitor {
    fn on_failed_serialize(&self, trace: Option<&Trace>, error: &ProcessingError) {
        warn!(
            spans = trace.map(Trace::len),
            %error,
            "failed to serialize trace"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;

    fn trace(op: &str) -> Trace {
        Trace::new(vec![Span::new(1, 1, 0, "svc", op)])
    }

    #[test]
    fn null_dispatcher_counts() {
        let dispatcher = NullDispatcher::new();
        dispatcher.add_trace(trace("a")).unwrap();
        dispatcher.add_trace(trace("b")).unwrap();
        dispatcher.flush().unwrap();

        assert_eq!(dispatcher.trace_count(), 2);
        assert_eq!(dispatcher.flush_count(), 1);
    }

    #[test]
    fn json_lines_dispatcher_emits_one_line_per_trace() {
        let dispatcher = JsonLinesDispatcher::new(Vec::new());
        dispatcher.add_trace(trace("first")).unwrap();
        dispatcher.add_trace(trace("second")).unwrap();
        assert_eq!(dispatcher.buffered(), 2);

        dispatcher.flush().unwrap();
        assert_eq!(dispatcher.buffered(), 0);

        let output = dispatcher.writer.lock().unwrap().clone();
        let lines: Vec<&str> = std::str::from_utf8(&output)
            .unwrap()
            .lines()
            .collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["spans"][0]["operation"], "first");
    }

    #[test]
    fn sample_rate_transform_stamps_root() {
        let transform = SampleRateTransform::new(0.25);
        let mut t = trace("op");
        transform.on_trace_complete(&mut t).unwrap();
        assert_eq!(
            t.root().unwrap().metrics.get("_sample_rate").copied(),
            Some(0.25)
        );
    }
}
