use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sampling priorities as supplied to `publish`.
///
/// The two-tier strategy routes priorities above its threshold (default 0)
/// to the guaranteed-attempt primary tier, so with the default threshold the
/// keep decisions ride primary and the drop decisions ride best-effort.
pub mod priority {
    /// The user explicitly requested this trace be dropped.
    pub const USER_DROP: i32 = -1;
    /// The sampler decided to drop this trace.
    pub const SAMPLER_DROP: i32 = 0;
    /// The sampler decided to keep this trace.
    pub const SAMPLER_KEEP: i32 = 1;
    /// The user explicitly requested this trace be kept.
    pub const USER_KEEP: i32 = 2;
}

/// One unit of work inside a trace.
///
/// The pipeline treats spans as opaque payload; the instrumentation layer
/// owns their production and finalization. The numeric metrics map is the
/// one seam post-processing writes through (sampling rates and the like).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Trace this span belongs to.
    pub trace_id: u64,
    /// Unique within the trace.
    pub span_id: u64,
    /// 0 for a root span.
    pub parent_id: u64,
    /// Service that emitted the span.
    pub service: String,
    /// Operation name.
    pub operation: String,
    /// Start time, Unix nanoseconds.
    pub start_nanos: u64,
    /// Wall-clock duration in nanoseconds.
    pub duration_nanos: u64,
    /// Numeric metrics attached by post-processing (boxed to keep the span
    /// small while it moves through the queues).
    pub metrics: Box<HashMap<String, f64>>,
}

impl Span {
    pub fn new(
        trace_id: u64,
        span_id: u64,
        parent_id: u64,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_id,
            service: service.into(),
            operation: operation.into(),
            start_nanos: 0,
            duration_nanos: 0,
            metrics: Box::default(),
        }
    }

    /// Attaches a numeric metric, replacing any previous value.
    pub fn set_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }
}

/// An ordered sequence of spans representing one completed unit of work.
///
/// Immutable once handed to the pipeline, except for the in-place adjustment
/// the configured transform applies on the worker thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    spans: Vec<Span>,
}

impl Trace {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn spans_mut(&mut self) -> &mut [Span] {
        &mut self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The trace id of the first span, if any.
    pub fn trace_id(&self) -> Option<u64> {
        self.spans.first().map(|span| span.trace_id)
    }

    /// The root span: the first span without a parent, or the first span
    /// when the root was dropped upstream.
    pub fn root(&self) -> Option<&Span> {
        self.spans
            .iter()
            .find(|span| span.parent_id == 0)
            .or_else(|| self.spans.first())
    }

    /// Mutable access to the root span, same selection as [`root`](Self::root).
    pub fn root_mut(&mut self) -> Option<&mut Span> {
        let idx = self
            .spans
            .iter()
            .position(|span| span.parent_id == 0)
            .unwrap_or(0);
        self.spans.get_mut(idx)
    }
}

impl From<Vec<Span>> for Trace {
    fn from(spans: Vec<Span>) -> Self {
        Self::new(spans)
    }
}
