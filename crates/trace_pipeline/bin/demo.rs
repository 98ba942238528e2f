//! Demo: several producer threads publish generated traces through the
//! pipeline; flushed payloads come out as JSON lines on stdout.
//!
//! Run with: `cargo run -p trace_pipeline --bin demo`

use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trace_pipeline::{
    priority, JsonLinesDispatcher, LoggingMonitor, PayloadDispatcher, PipelineConfig,
    SampleRateTransform, Span, Trace, TracePipeline,
};
use tracing_subscriber::EnvFilter;

const PRODUCERS: u64 = 4;
const TRACES_PER_PRODUCER: u64 = 50;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let dispatcher = Arc::new(JsonLinesDispatcher::new(std::io::stdout()));
    let config = PipelineConfig::default()
        .with_capacity(256)
        .with_flush_interval(Duration::from_millis(200))
        .with_heartbeat_period(Duration::from_millis(50));
    let pipeline = Arc::new(TracePipeline::new(
        config,
        Box::new(SampleRateTransform::new(1.0)),
        Arc::clone(&dispatcher) as Arc<dyn PayloadDispatcher>,
        Arc::new(LoggingMonitor),
    ));
    pipeline.start().expect("fresh pipeline starts");

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for seq in 0..TRACES_PER_PRODUCER {
                    let trace_id = producer * TRACES_PER_PRODUCER + seq + 1;
                    let mut root = Span::new(trace_id, 1, 0, "demo-service", "handle.request");
                    root.start_nanos = rng.gen_range(0..1_000_000_000);
                    root.duration_nanos = rng.gen_range(10_000..5_000_000);
                    let child = Span::new(trace_id, 2, 1, "demo-service", "db.query");
                    let trace = Trace::new(vec![root, child]);

                    let sampling = rng.gen_range(priority::USER_DROP..=priority::USER_KEEP);
                    pipeline.publish(sampling, trace);
                    thread::sleep(Duration::from_millis(rng.gen_range(1..5)));
                }
            })
        })
        .collect();

    for producer in producers {
        let _ = producer.join();
    }

    let flushed = pipeline.flush(Duration::from_secs(5));
    let metrics = pipeline.metrics();
    eprintln!(
        "final flush ok={flushed} published={} dropped={} processed={} flushes={} failed={}",
        metrics.published(),
        metrics.dropped(),
        metrics.processed(),
        metrics.flushes(),
        metrics.failed()
    );
    pipeline.close();
}
