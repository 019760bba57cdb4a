use lumacheck_common::frame::Frame;

use crate::error::MetricsError;

/// A measurement computed from a single frame.
///
/// Implementations hold no per-frame state: the output depends only on the
/// frame passed in.
pub trait FrameMetric: Send + Sync {
    type Output;

    fn measure(&self, frame: &Frame) -> Result<Self::Output, MetricsError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
