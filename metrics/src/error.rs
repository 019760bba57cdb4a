use lumacheck_common::frame::FrameError;

/// Failures surfaced by the estimators.
///
/// Every variant is final for the call that produced it: estimators never
/// retry and never fall back to a default score.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The frame is empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No compute-capable device is available. Not retryable.
    #[error("compute backend initialization failed: {0}")]
    Initialization(String),
    /// A texture, buffer or command allocation failed mid-pipeline.
    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),
}

impl From<FrameError> for MetricsError {
    fn from(e: FrameError) -> Self {
        MetricsError::InvalidInput(e.to_string())
    }
}
