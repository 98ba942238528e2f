//! Bounded, non-blocking trace-processing pipeline.
//!
//! Many application threads publish completed traces; one background worker
//! consumes them, applies post-processing, and hands them to a payload
//! dispatcher for batched shipment. Producers never block: when the routed
//! queue tier is full the trace is dropped and `publish` reports it, trading
//! completeness for application-thread latency.
//!
//! Two queue tiers back the routing: sampled-to-keep traces ride the primary
//! tier (guaranteed attempt), the rest ride best-effort. Sustained primary
//! traffic may starve the secondary tier indefinitely; that is a deliberate
//! trade, not round-robin fairness.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trace_pipeline::{
//!     priority, NoopTransform, NullDispatcher, NullMonitor, PipelineConfig, Span, Trace,
//!     TracePipeline,
//! };
//!
//! let dispatcher = Arc::new(NullDispatcher::new());
//! let pipeline = TracePipeline::new(
//!     PipelineConfig::default(),
//!     Box::new(NoopTransform),
//!     Arc::clone(&dispatcher) as Arc<dyn trace_pipeline::PayloadDispatcher>,
//!     Arc::new(NullMonitor),
//! );
//! pipeline.start().unwrap();
//!
//! let trace = Trace::new(vec![Span::new(1, 1, 0, "web", "GET /users")]);
//! assert!(pipeline.publish(priority::SAMPLER_KEEP, trace));
//!
//! // Blocks the caller (not the pipeline) until the worker flushed.
//! assert!(pipeline.flush(Duration::from_secs(5)));
//! assert_eq!(dispatcher.trace_count(), 1);
//!
//! pipeline.close();
//! ```

mod dispatch;
mod error;
mod event;
mod metrics;
mod pipeline;
mod strategy;
mod timer;
mod trace;
mod worker;

pub use dispatch::{
    FailureMonitor, JsonLinesDispatcher, LoggingMonitor, NoopTransform, NullDispatcher,
    NullMonitor, PayloadDispatcher, SampleRateTransform, TraceTransform,
};
pub use error::{PipelineError, ProcessingError};
pub use event::{Event, FlushGate};
pub use metrics::PipelineMetrics;
pub use pipeline::{PipelineConfig, TracePipeline};
pub use strategy::{Prioritization, PrioritizationStrategy};
pub use timer::{Clock, ManualClock, ManualScheduler, MonotonicClock, ScheduledTask, Scheduler, ThreadScheduler};
pub use trace::{priority, Span, Trace};
