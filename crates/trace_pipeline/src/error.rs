use thiserror::Error;

/// Failure raised by a collaborator while post-processing or dispatching a
/// single trace.
///
/// These never escape the worker loop: each one is logged, reported to the
/// [`FailureMonitor`](crate::FailureMonitor), and the loop moves on.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The transform rejected or failed to adjust a trace.
    #[error("transform error: {0}")]
    Transform(String),

    /// The dispatcher could not serialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The dispatcher could not hand a payload to its transport.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Lifecycle misuse of the pipeline itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// `start` was called twice.
    #[error("pipeline already started")]
    AlreadyStarted,

    /// The pipeline was closed; closed pipelines are never restarted.
    #[error("pipeline is closed")]
    Closed,

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}
